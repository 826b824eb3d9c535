//! Pipeline stages.

use std::fmt;

/// One stage of the build. Stages run strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Configure,
    FetchToolchain,
    CloneKernelSource,
    CloneExtraAssets,
    Defconfig,
    Compile,
    LocateArtifact,
    Package,
    Report,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Self; 9] = [
        Self::Configure,
        Self::FetchToolchain,
        Self::CloneKernelSource,
        Self::CloneExtraAssets,
        Self::Defconfig,
        Self::Compile,
        Self::LocateArtifact,
        Self::Package,
        Self::Report,
    ];

    /// The stage after this one, `None` after [`Stage::Report`].
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// 1-based position for progress output.
    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::FetchToolchain => "fetch toolchain",
            Self::CloneKernelSource => "clone kernel source",
            Self::CloneExtraAssets => "clone extra assets",
            Self::Defconfig => "defconfig",
            Self::Compile => "compile",
            Self::LocateArtifact => "locate artifact",
            Self::Package => "package",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
