use crate::{ArtifactSnapshot, BuildArtifact};

/// Artifacts from `current` that should be pushed to the engine: reloadable
/// kinds that are new or whose fingerprint changed. Keeps `current` order.
pub fn diff(previous: &ArtifactSnapshot, current: &ArtifactSnapshot) -> Vec<BuildArtifact> {
    current
        .iter()
        .filter(|a| a.kind().is_reloadable())
        .filter(|a| previous.get(&a.engine_resource_path).map_or(true, |old| old.fingerprint != a.fingerprint))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(entries: &[(&str, &str)]) -> ArtifactSnapshot {
        entries
            .iter()
            .map(|(p, fp)| BuildArtifact {
                engine_resource_path: p.to_string(),
                compiled_file_path: format!("default{}", p),
                fingerprint: fp.to_string(),
            })
            .collect()
    }

    fn paths(v: &[BuildArtifact]) -> Vec<&str> {
        v.iter().map(|a| a.engine_resource_path.as_str()).collect()
    }

    #[test]
    fn reports_changed_and_new_supported_entries() {
        let old = snap(&[("/main/player.scriptc", "1"), ("/utils/helper.lua", "1"), ("/main/main.goc", "1")]);
        let new = snap(&[
            ("/main/player.scriptc", "2"),
            ("/utils/helper.lua", "1"),
            ("/main/main.goc", "1"),
            ("/ui/hud.gui_scriptc", "1"),
        ]);
        assert_eq!(paths(&diff(&old, &new)), vec!["/main/player.scriptc", "/ui/hud.gui_scriptc"]);
    }

    #[test]
    fn textures_and_unknown_kinds_never_reload() {
        let old = snap(&[("/main/atlas.texturec", "1"), ("/main/sfx.oggc", "1")]);
        let new = snap(&[("/main/atlas.texturec", "2"), ("/main/sfx.oggc", "2"), ("/main/new.texturec", "1")]);
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn empty_previous_returns_all_supported_in_order() {
        let new = snap(&[("/b.lua", "1"), ("/a.texturec", "1"), ("/a.goc", "1")]);
        assert_eq!(paths(&diff(&ArtifactSnapshot::new(), &new)), vec!["/b.lua", "/a.goc"]);
    }

    #[test]
    fn removed_entries_are_not_reported() {
        let old = snap(&[("/gone.scriptc", "1")]);
        assert!(diff(&old, &ArtifactSnapshot::new()).is_empty());
    }
}
