//! 网络与页面解析：会话 Cookie、HTTP 请求、模型页面字段提取。

pub mod auth;
pub mod network;
pub mod parser;
