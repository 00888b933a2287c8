//! Shared constants for the ontology engine.

/// Operating system architecture markers used for path normalization.
pub const X86_64: &str = "x86_64";
pub const X86: &str = "x86";

pub const SYSTEM_DRIVE: &str = "c:\\";
pub const SYSTEM_ROOT: &str = "c:\\windows\\";
pub const WINDIR_ENV_VARIABLE: &str = "%windir%";
pub const SAMPLEPATH_ENV_VARIABLE: &str = "%samplepath%";

/// Minimum lengths that free-text IOC candidates must have when the caller
/// asks for character-minimum enforcement.
pub const MIN_DOMAIN_CHARS: usize = 8;
pub const MIN_URI_CHARS: usize = 11;
pub const MIN_URI_PATH_CHARS: usize = 4;

/// Samples that inject themselves for the entire analysis time can produce
/// chains with depths beyond 1000. No process tree that deep is useful for a
/// reviewer, so the builder stops attaching once any tree reaches this depth.
pub const PROCESS_TREE_DEPTH_LIMIT: usize = 10;

/// Filename patterns for artifacts dumped by the HollowsHunter tool.
pub const HOLLOWSHUNTER_EXE_PATTERN: &str =
    r"[0-9]{1,}_hollowshunter/hh_process_[0-9]{3,}_[0-9a-z]{3,}(\.[a-zA-Z0-9]{2,})*\.exe$";
pub const HOLLOWSHUNTER_DLL_PATTERN: &str =
    r"[0-9]{1,}_hollowshunter/hh_process_[0-9]{3,}_[0-9a-z]{3,}(\.[a-zA-Z0-9]{2,})*\.dll$";

pub const HOLLOWSHUNTER_TITLE: &str = "HollowsHunter Injected Portable Executable";

/// Default heuristic ID raised for injected portable executables.
pub const DEFAULT_INJECTION_HEUR_ID: i32 = 17;
