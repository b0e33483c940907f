use std::fmt;
use std::str::FromStr;

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageUsers,
    RunPipelines,
    CreateEditPipelines,
    ViewData,
    AccessSettings,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::RunPipelines => "run_pipelines",
            Permission::CreateEditPipelines => "create_edit_pipelines",
            Permission::ViewData => "view_data",
            Permission::AccessSettings => "access_settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage_users" => Ok(Permission::ManageUsers),
            "run_pipelines" => Ok(Permission::RunPipelines),
            "create_edit_pipelines" => Ok(Permission::CreateEditPipelines),
            "view_data" => Ok(Permission::ViewData),
            "access_settings" => Ok(Permission::AccessSettings),
            other => anyhow::bail!("Unknown permission: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Editor, Role::Viewer, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
            Role::User => "user",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[
                ManageUsers,
                RunPipelines,
                CreateEditPipelines,
                ViewData,
                AccessSettings,
            ],
            Role::Editor => &[RunPipelines, CreateEditPipelines, ViewData],
            Role::Viewer => &[ViewData],
            Role::User => &[ViewData, RunPipelines],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown role: '{}'", s))
    }
}

/// Whether the stored role string grants `permission`. Unknown roles grant nothing.
pub fn has_permission(role: &str, permission: Permission) -> bool {
    role.parse::<Role>()
        .map(|r| r.permissions().contains(&permission))
        .unwrap_or(false)
}
