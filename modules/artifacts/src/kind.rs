use std::path::Path;

/// Resource category, judged from the compiled file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    LuaModule,
    GuiScript,
    Collection,
    Texture,
    Other,
}

impl ResourceKind {
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("scriptc") => ResourceKind::Script,
            Some("lua") => ResourceKind::LuaModule,
            Some("gui_scriptc") => ResourceKind::GuiScript,
            Some("goc") => ResourceKind::Collection,
            Some("texturec") => ResourceKind::Texture,
            _ => ResourceKind::Other,
        }
    }

    /// Whether the engine can swap this kind of resource in place.
    pub fn is_reloadable(self) -> bool {
        matches!(self, ResourceKind::Script | ResourceKind::LuaModule | ResourceKind::GuiScript | ResourceKind::Collection)
    }
}
