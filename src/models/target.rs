use url::Url;

/// A symbolic target name together with the absolute page URL it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub name: String,
    pub url: Url,
}

impl TargetDescriptor {
    /// Builds the fee page URL as `base + path + suffix`. Surrounding
    /// whitespace in the catalog path is ignored.
    pub fn resolve(
        name: impl Into<String>,
        base_url: &str,
        relative_path: &str,
        page_suffix: &str,
    ) -> Result<Self, url::ParseError> {
        let joined = format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            relative_path.trim(),
            page_suffix
        );
        Ok(Self {
            name: name.into(),
            url: Url::parse(&joined)?,
        })
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_path_and_suffix() {
        let target = TargetDescriptor::resolve(
            "IIT Delhi",
            "https://collegedunia.com",
            " /university/25455-iit-delhi \n",
            "/courses-fees",
        )
        .unwrap();

        assert_eq!(target.name, "IIT Delhi");
        assert_eq!(
            target.url_str(),
            "https://collegedunia.com/university/25455-iit-delhi/courses-fees"
        );
    }

    #[test]
    fn test_resolve_tolerates_trailing_slash_on_base() {
        let target =
            TargetDescriptor::resolve("x", "https://example.com/", "/college/1", "/courses-fees")
                .unwrap();
        assert_eq!(target.url_str(), "https://example.com/college/1/courses-fees");
    }

    #[test]
    fn test_resolve_rejects_bad_base() {
        assert!(TargetDescriptor::resolve("x", "not a url", "/a", "/b").is_err());
    }
}
