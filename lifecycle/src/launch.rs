/// Where this run was started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    pub referrer: String,
    pub location: String,
    pub localhost: bool,
}

impl LaunchContext {
    pub fn new(
        referrer: impl Into<String>,
        location: impl Into<String>,
        localhost_hosts: &[String],
    ) -> Self {
        let location = location.into();
        let localhost = host_of(&location)
            .is_some_and(|host| localhost_hosts.iter().any(|known| known == host));
        Self {
            referrer: referrer.into(),
            location,
            localhost,
        }
    }

    /// A page reload keeps the referrer pointing at the current location.
    pub fn is_reload(&self) -> bool {
        let is_reload =
            !self.referrer.is_empty() && strip_fragment(&self.referrer) == strip_fragment(&self.location);
        log::debug!(
            "App reload: '{is_reload}', Referrer: '{}', Location: '{}'",
            self.referrer,
            self.location
        );
        is_reload
    }

    pub fn is_login_redirect(&self) -> bool {
        let referrer = self.referrer.to_lowercase();
        referrer.contains("/auth") || referrer.contains("/login")
    }

    /// The credential is taken from cache right after login and on local builds.
    pub fn use_cached_token(&self) -> bool {
        self.localhost || self.is_login_redirect()
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["localhost".to_string(), "127.0.0.1".to_string()]
    }

    #[test]
    fn test_reload_ignores_fragment() {
        let launch = LaunchContext::new(
            "https://app.example.com/#conversation/1",
            "https://app.example.com/",
            &hosts(),
        );
        assert!(launch.is_reload());
    }

    #[test]
    fn test_empty_referrer_is_not_reload() {
        let launch = LaunchContext::new("", "https://app.example.com/", &hosts());
        assert!(!launch.is_reload());
    }

    #[test]
    fn test_login_redirect_uses_cached_token() {
        let launch = LaunchContext::new(
            "https://app.example.com/Auth/?x=1",
            "https://app.example.com/",
            &hosts(),
        );
        assert!(launch.is_login_redirect());
        assert!(launch.use_cached_token());
    }

    #[test]
    fn test_localhost_detection() {
        let local = LaunchContext::new("", "http://localhost:8080/app", &hosts());
        let remote = LaunchContext::new("", "https://app.example.com/", &hosts());
        assert!(local.localhost);
        assert!(local.use_cached_token());
        assert!(!remote.use_cached_token());
    }
}
