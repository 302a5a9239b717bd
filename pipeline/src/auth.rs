/// Source of the bearer token sent with every detection request.
///
/// Read once per submission, so a token refreshed between submissions is picked up.
pub trait TokenProvider {
    fn token(&self) -> Option<String>;
}

/// Fixed token, for native tools and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String>,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Empty strings count as "not logged in".
pub(crate) fn usable_token(provider: &dyn TokenProvider) -> Option<String> {
    provider.token().filter(|token| !token.trim().is_empty())
}
