use serde::Serialize;
use std::fmt;

/// Package families that need special handling after extraction.
///
/// The set is closed: anything not listed is `Generic` and only receives the
/// common configuration rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PackageFamily {
    Slic,
    Root,
    Java,
    Lcio,
    Lcsim,
    StdhepCutJava,
    Generic,
}

impl PackageFamily {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "slic" => Self::Slic,
            "root" => Self::Root,
            "java" => Self::Java,
            "lcio" => Self::Lcio,
            "lcsim" => Self::Lcsim,
            "stdhepcutjava" => Self::StdhepCutJava,
            _ => Self::Generic,
        }
    }

    /// Whether the extracted top-level directory must be renamed to the
    /// canonical `<name><version>` folder.
    pub fn renames_extracted_root(self) -> bool {
        matches!(self, Self::Slic)
    }

    /// Whether a working Java runtime must be present for the package to be
    /// usable.
    pub fn requires_java(self) -> bool {
        matches!(self, Self::Lcio | Self::Lcsim | Self::StdhepCutJava)
    }
}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Slic => "slic",
            Self::Root => "root",
            Self::Java => "java",
            Self::Lcio => "lcio",
            Self::Lcsim => "lcsim",
            Self::StdhepCutJava => "stdhepcutjava",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(PackageFamily::from_name("ROOT"), PackageFamily::Root);
        assert_eq!(PackageFamily::from_name("Slic"), PackageFamily::Slic);
        assert_eq!(
            PackageFamily::from_name("StdHepCutJava"),
            PackageFamily::StdhepCutJava
        );
        assert_eq!(PackageFamily::from_name("ddsim"), PackageFamily::Generic);
    }

    #[test]
    fn test_family_traits() {
        assert!(PackageFamily::Slic.renames_extracted_root());
        assert!(!PackageFamily::Root.renames_extracted_root());
        assert!(PackageFamily::Lcio.requires_java());
        assert!(PackageFamily::Lcsim.requires_java());
        assert!(!PackageFamily::Java.requires_java());
        assert!(!PackageFamily::Generic.requires_java());
    }
}
