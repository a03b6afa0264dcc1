//! Root check performed before any line is claimed.

/// `true` when the effective uid is 0.
#[cfg(unix)]
pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// GPIO and `shutdown` are only reachable on Unix hosts.
#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}
