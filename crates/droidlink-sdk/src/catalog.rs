//! Android target catalog.
//!
//! Maps the user-facing architecture selector onto Rust target triples and the
//! `jniLibs` ABI folders that must receive the compiled library.
//!
//! | Selector  | Rust triple                 | ABI folders                       |
//! |-----------|-----------------------------|-----------------------------------|
//! | `aarch64` | `aarch64-linux-android`     | `arm64`, `arm64-v8a`              |
//! | `armv7`   | `armv7-linux-androideabi`   | `arm`, `armeabi`, `armeabi-v7a`   |
//! | `i686`    | `i686-linux-android`        | `x86`                             |
//! | `x86_64`  | `x86_64-linux-android`      | `x86_64`                          |
//!
//! `all` expands to every row, in table order.
//!
//! Adding a target means adding an [`Arch`] variant and a row to the table;
//! resolution itself never branches on individual architectures.

use std::fmt;
use std::str::FromStr;

use crate::types::DroidlinkError;

/// A single Android CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARM (hard-float, v7).
    Armv7,
    /// 32-bit x86.
    I686,
    /// 64-bit x86.
    X86_64,
}

impl Arch {
    /// Every architecture, in catalog order.
    pub const ALL: [Arch; 4] = [Arch::Aarch64, Arch::Armv7, Arch::I686, Arch::X86_64];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Aarch64 => "aarch64",
            Arch::Armv7 => "armv7",
            Arch::I686 => "i686",
            Arch::X86_64 => "x86_64",
        }
    }

    /// Returns the catalog entry for this architecture.
    pub fn descriptor(self) -> TargetDescriptor {
        CATALOG[self as usize]
    }
}

/// One compilation target: a Rust triple plus the ABI folders that share its artifact.
///
/// Descriptors only come from the static catalog, so they are `Copy` and
/// cheap to hand to worker tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// Architecture this row belongs to.
    pub arch: Arch,
    /// Rust target triple passed to `rustup` and `cargo --target`.
    pub triple: &'static str,
    /// `jniLibs` subfolders (ABI aliases) that each receive the artifact. Never empty.
    pub output_folders: &'static [&'static str],
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.triple)
    }
}

/// The fixed target table, indexed by `Arch as usize`.
pub const CATALOG: [TargetDescriptor; Arch::ALL.len()] = [
    TargetDescriptor {
        arch: Arch::Aarch64,
        triple: "aarch64-linux-android",
        output_folders: &["arm64", "arm64-v8a"],
    },
    TargetDescriptor {
        arch: Arch::Armv7,
        triple: "armv7-linux-androideabi",
        output_folders: &["arm", "armeabi", "armeabi-v7a"],
    },
    TargetDescriptor {
        arch: Arch::I686,
        triple: "i686-linux-android",
        output_folders: &["x86"],
    },
    TargetDescriptor {
        arch: Arch::X86_64,
        triple: "x86_64-linux-android",
        output_folders: &["x86_64"],
    },
];

/// Architecture selection as given on the command line.
///
/// # Example
///
/// ```
/// use droidlink_sdk::catalog::{resolve, ArchSelector};
///
/// let selector: ArchSelector = "armv7".parse().unwrap();
/// let targets = resolve(selector);
/// assert_eq!(targets[0].output_folders, ["arm", "armeabi", "armeabi-v7a"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchSelector {
    /// Every architecture in the catalog.
    #[default]
    All,
    /// A single architecture.
    Single(Arch),
}

impl ArchSelector {
    /// Accepted spellings, in the order they are shown to users.
    pub const NAMES: [&'static str; 5] = ["all", "aarch64", "armv7", "i686", "x86_64"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchSelector::All => "all",
            ArchSelector::Single(arch) => arch.as_str(),
        }
    }
}

impl FromStr for ArchSelector {
    type Err = DroidlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ArchSelector::All);
        }
        Arch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .map(ArchSelector::Single)
            .ok_or_else(|| DroidlinkError::UnknownSelector(s.to_string()))
    }
}

impl fmt::Display for ArchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a selector to its target descriptors.
///
/// Pure and total: every selector yields at least one descriptor, and triples
/// never repeat within the result.
pub fn resolve(selector: ArchSelector) -> Vec<TargetDescriptor> {
    match selector {
        ArchSelector::All => CATALOG.to_vec(),
        ArchSelector::Single(arch) => vec![arch.descriptor()],
    }
}

/// Parses and resolves a selector in one step.
///
/// Fails with [`DroidlinkError::UnknownSelector`] for anything outside
/// [`ArchSelector::NAMES`].
pub fn resolve_str(selector: &str) -> Result<Vec<TargetDescriptor>, DroidlinkError> {
    selector.parse().map(resolve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn selectors() -> Vec<ArchSelector> {
        ArchSelector::NAMES
            .iter()
            .map(|name| name.parse().unwrap())
            .collect()
    }

    #[test]
    fn test_catalog_is_indexed_by_arch() {
        for arch in Arch::ALL {
            assert_eq!(arch.descriptor().arch, arch);
        }
    }

    #[test]
    fn test_every_descriptor_has_output_folders() {
        for descriptor in CATALOG {
            assert!(
                !descriptor.output_folders.is_empty(),
                "{} has no output folders",
                descriptor.triple
            );
        }
    }

    #[test]
    fn test_resolve_is_non_empty_and_duplicate_free() {
        for selector in selectors() {
            let targets = resolve(selector);
            assert!(!targets.is_empty(), "{selector} resolved to nothing");

            let triples: HashSet<_> = targets.iter().map(|t| t.triple).collect();
            assert_eq!(triples.len(), targets.len(), "{selector} has duplicates");
        }
    }

    #[test]
    fn test_all_is_union_of_single_selectors() {
        let all: HashSet<_> = resolve(ArchSelector::All)
            .into_iter()
            .map(|t| t.triple)
            .collect();
        let union: HashSet<_> = Arch::ALL
            .into_iter()
            .flat_map(|arch| resolve(ArchSelector::Single(arch)))
            .map(|t| t.triple)
            .collect();
        assert_eq!(all, union);
    }

    #[test]
    fn test_all_order_is_stable() {
        let triples: Vec<_> = resolve(ArchSelector::All).iter().map(|t| t.triple).collect();
        assert_eq!(
            triples,
            [
                "aarch64-linux-android",
                "armv7-linux-androideabi",
                "i686-linux-android",
                "x86_64-linux-android",
            ]
        );
    }

    #[test]
    fn test_x86_64_selector() {
        let targets = resolve_str("x86_64").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].triple, "x86_64-linux-android");
        assert_eq!(targets[0].output_folders, ["x86_64"]);
    }

    #[test]
    fn test_armv7_selector() {
        let targets = resolve_str("armv7").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].triple, "armv7-linux-androideabi");
        assert_eq!(targets[0].output_folders, ["arm", "armeabi", "armeabi-v7a"]);
    }

    #[test]
    fn test_unknown_selector() {
        let err = resolve_str("mips").unwrap_err();
        assert!(matches!(err, DroidlinkError::UnknownSelector(ref s) if s == "mips"));
        assert!(err.to_string().contains("x86_64"));
    }

    #[test]
    fn test_selector_round_trips_through_display() {
        for name in ArchSelector::NAMES {
            let selector: ArchSelector = name.parse().unwrap();
            assert_eq!(selector.to_string(), name);
        }
    }
}
