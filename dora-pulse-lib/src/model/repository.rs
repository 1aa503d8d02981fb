use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Identity of a hosted repository for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Repository {
    owner: Arc<str>,
    name: Arc<str>,
}

impl Repository {
    #[must_use]
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            owner: Arc::from(owner.as_ref()),
            name: Arc::from(name.as_ref()),
        }
    }

    /// Parse either `owner/name` or a repository URL such as `https://github.com/owner/name.git`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        if text.contains("://") {
            let url = Url::parse(text).into_app_err_with(|| format!("parsing repository URL '{text}'"))?;
            return Self::from_url(&url);
        }

        let mut parts = text.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => Self::from_parts(owner, name, text),
            _ => bail!("invalid repository '{text}': expected 'owner/name'"),
        }
    }

    fn from_url(url: &Url) -> Result<Self> {
        let segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        match segments.as_slice() {
            [owner, name, ..] => Self::from_parts(owner, name, url.as_str()),
            _ => bail!("invalid repository URL format: {url}"),
        }
    }

    fn from_parts(owner: &str, name: &str, original: &str) -> Result<Self> {
        let name = name.trim_end_matches(".git");
        if owner.is_empty() || name.is_empty() {
            bail!("invalid repository '{original}': empty owner or repository name");
        }

        Ok(Self::new(owner, name))
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
