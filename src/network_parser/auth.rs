//! 会话 Cookie 状态：每次请求携带，每次响应后合并。

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    cookies: BTreeMap<String, String>,
}

impl AuthState {
    pub fn new<I, K, V>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = Self::default();
        state.merge(initial);
        state
    }

    /// 同名覆盖、新名追加，从不删除已有条目。
    pub fn merge<I, K, V>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in cookies {
            self.cookies.insert(name.into(), value.into());
        }
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// `Cookie` 请求头的值；没有 Cookie 时返回 `None`。
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_and_adds_but_never_removes() {
        let mut auth = AuthState::new([("a", "1"), ("b", "2")]);
        auth.merge([("b", "20"), ("c", "3")]);

        assert_eq!(auth.get("a"), Some("1"));
        assert_eq!(auth.get("b"), Some("20"));
        assert_eq!(auth.get("c"), Some("3"));
        assert_eq!(auth.cookies().len(), 3);

        auth.merge(Vec::<(String, String)>::new());
        assert_eq!(auth.cookies().len(), 3);
    }

    #[test]
    fn header_value_joins_pairs() {
        assert_eq!(AuthState::default().header_value(), None);
        let auth = AuthState::new([("b", "2"), ("a", "1")]);
        assert_eq!(auth.header_value().as_deref(), Some("a=1; b=2"));
    }
}
