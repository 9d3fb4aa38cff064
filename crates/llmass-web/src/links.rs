use url::Url;

use libllmass::PollLinks;
use llmass_protocol::Ticket;

use crate::auth::SharedSecret;

/// Parse the configured public address. A bare host gets `https://`.
pub fn parse_base_url(fqdn: &str) -> Result<Url, url::ParseError> {
    let fqdn = fqdn.trim();
    let url = if fqdn.contains("://") {
        Url::parse(fqdn)?
    } else {
        Url::parse(&format!("https://{fqdn}"))?
    };
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(url::ParseError::EmptyHost);
    }
    Ok(url)
}

/// Builds `<base>/callback?hash=..&session=..&ticket=N` links.
#[derive(Debug, Clone)]
pub struct CallbackLinks {
    base: Url,
    secret: SharedSecret,
}

impl CallbackLinks {
    pub fn new(base: Url, secret: SharedSecret) -> Self {
        Self { base, secret }
    }
}

impl PollLinks for CallbackLinks {
    fn poll_url(&self, session: &str, ticket: Ticket) -> String {
        let mut url = self.base.clone();
        let path = format!("{}/callback", self.base.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("hash", self.secret.expose())
            .append_pair("session", session)
            .append_pair("ticket", &ticket.to_string());
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(base: &str) -> CallbackLinks {
        CallbackLinks::new(parse_base_url(base).unwrap(), SharedSecret::new("s3cret"))
    }

    #[test]
    fn builds_callback_with_all_parameters() {
        assert_eq!(
            links("https://llm.example.com").poll_url("work", 7),
            "https://llm.example.com/callback?hash=s3cret&session=work&ticket=7"
        );
    }

    #[test]
    fn keeps_a_path_prefix_and_port() {
        assert_eq!(
            links("http://127.0.0.1:8080/llmass/").poll_url("s1", 1),
            "http://127.0.0.1:8080/llmass/callback?hash=s3cret&session=s1&ticket=1"
        );
    }

    #[test]
    fn bare_host_defaults_to_https() {
        assert_eq!(
            parse_base_url("llm.example.com").unwrap().as_str(),
            "https://llm.example.com/"
        );
        assert!(parse_base_url("https://").is_err());
        assert!(parse_base_url("file:///tmp").is_err());
    }
}
