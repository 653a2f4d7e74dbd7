pub mod archive;
pub mod jamendo;
pub mod pluto;
pub mod suno;
pub mod traits;

pub use archive::ArchiveSource;
pub use jamendo::JamendoSource;
pub use pluto::PlutoSource;
pub use suno::SunoSource;
pub use traits::{MediaSource, PageRequest, SearchKind, SearchQuery};

use crate::config::Config;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Sources this crate can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Jamendo,
    Archive,
    Pluto,
    Suno,
}

impl SourceKind {
    pub const ALL: [Self; 4] = [Self::Jamendo, Self::Archive, Self::Pluto, Self::Suno];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jamendo => "jamendo",
            Self::Archive => "archive",
            Self::Pluto => "pluto",
            Self::Suno => "suno",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jamendo" => Ok(Self::Jamendo),
            "archive" | "archive.org" | "archiveorg" => Ok(Self::Archive),
            "pluto" | "plutotv" | "pluto-tv" => Ok(Self::Pluto),
            "suno" => Ok(Self::Suno),
            other => Err(Error::invalid_input(
                "source",
                format!("unknown source '{other}'"),
            )),
        }
    }
}

/// Build one source from the shared configuration
pub fn build_source(kind: SourceKind, config: &Config) -> Result<Arc<dyn MediaSource>> {
    let source: Arc<dyn MediaSource> = match kind {
        SourceKind::Jamendo => Arc::new(JamendoSource::from_config(config)?),
        SourceKind::Archive => Arc::new(ArchiveSource::from_config(config)?),
        SourceKind::Pluto => Arc::new(PlutoSource::from_config(config)?),
        SourceKind::Suno => Arc::new(SunoSource::from_config(config)?),
    };
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!("Pluto-TV".parse::<SourceKind>().unwrap(), SourceKind::Pluto);
        assert!("youtube".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_build_every_source() {
        let config = Config::default();
        for kind in SourceKind::ALL {
            let source = build_source(kind, &config).unwrap();
            assert_eq!(source.id(), kind.as_str());
        }
    }
}
