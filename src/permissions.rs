//! User permissions requested through the `scope` parameter.

use std::fmt;
use std::str::FromStr;

/// Access permission of a user token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Notify,
    Friends,
    Photos,
    Audio,
    Video,
    Stories,
    Pages,
    Status,
    Notes,
    /// Available only after moderation of the application
    Messages,
    Wall,
    Offline,
    Docs,
    Groups,
    Notifications,
    Stats,
    Email,
    Market,
}

impl Permission {
    /// Every permission an ordinary application may request
    pub const AVAILABLE: [Permission; 17] = [
        Permission::Notify,
        Permission::Friends,
        Permission::Photos,
        Permission::Audio,
        Permission::Video,
        Permission::Stories,
        Permission::Pages,
        Permission::Status,
        Permission::Notes,
        Permission::Wall,
        Permission::Offline,
        Permission::Docs,
        Permission::Groups,
        Permission::Notifications,
        Permission::Stats,
        Permission::Email,
        Permission::Market,
    ];

    pub fn bitmask(self) -> u32 {
        match self {
            Permission::Notify => 1,
            Permission::Friends => 2,
            Permission::Photos => 4,
            Permission::Audio => 8,
            Permission::Video => 16,
            Permission::Stories => 64,
            Permission::Pages => 128,
            Permission::Status => 1024,
            Permission::Notes => 2048,
            Permission::Messages => 4096,
            Permission::Wall => 8192,
            Permission::Offline => 65536,
            Permission::Docs => 131072,
            Permission::Groups => 262144,
            Permission::Notifications => 524288,
            Permission::Stats => 1048576,
            Permission::Email => 4194304,
            Permission::Market => 134217728,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Notify => "notify",
            Permission::Friends => "friends",
            Permission::Photos => "photos",
            Permission::Audio => "audio",
            Permission::Video => "video",
            Permission::Stories => "stories",
            Permission::Pages => "pages",
            Permission::Status => "status",
            Permission::Notes => "notes",
            Permission::Messages => "messages",
            Permission::Wall => "wall",
            Permission::Offline => "offline",
            Permission::Docs => "docs",
            Permission::Groups => "groups",
            Permission::Notifications => "notifications",
            Permission::Stats => "stats",
            Permission::Email => "email",
            Permission::Market => "market",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::AVAILABLE
            .iter()
            .chain(std::iter::once(&Permission::Messages))
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

/// Scope bit mask of a set of permissions
pub fn bit_scope(permissions: &[Permission]) -> u32 {
    permissions.iter().fold(0, |scope, p| scope | p.bitmask())
}

/// Comma separated permission names, the other accepted scope format
pub fn scope_names(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
