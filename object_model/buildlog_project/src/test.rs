use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use buildlog_tree::Container;

use crate::Project;

fn project() -> Project {
    Project::new("App", Some(PathBuf::from("/src/App/App.CSProj")))
}

#[test]
fn project_file_fields() {
    let project = project();

    assert_eq!(project.project_file_extension(), ".csproj");
    assert_eq!(
        project.source_file_path(),
        Some(PathBuf::from("/src/App/App.CSProj").as_path())
    );

    let bare = Project::new("Bare", None);
    assert_eq!(bare.project_file_extension(), "");
    assert_eq!(bare.source_file_path(), None);

    let no_extension = Project::new("Make", Some(PathBuf::from("Makefile")));
    assert_eq!(no_extension.project_file_extension(), "");
}

#[test]
fn display_lists_id_name_and_file() {
    let project = project();

    assert_eq!(
        project.to_string(),
        format!(
            "Project Id={} Name=App File=/src/App/App.CSProj",
            project.id().index()
        )
    );
}

#[test]
fn selection_masks_low_relevance() {
    let project = project();

    assert!(!project.is_low_relevance());
    assert!(project.set_low_relevance(true));
    assert!(!project.set_low_relevance(true));
    assert!(project.is_low_relevance());

    project.set_selected(true);
    assert!(!project.is_low_relevance());

    project.set_selected(false);
    assert!(project.is_low_relevance());
}

#[test]
fn try_add_target_attaches_once() {
    let project = project();
    let target = project.targets().get_or_create_by_name("Build");

    assert!(project.try_add_target(&target));
    assert!(!project.try_add_target(&target));

    assert_eq!(project.children().len(), 1);
    assert_eq!(target.parent(), Some(project.id()));
}

#[test]
fn try_add_target_skips_target_nested_elsewhere() {
    let project = project();
    let parent = project.targets().create_or_update("Build", 1);
    let child = project.targets().create_or_update("CoreBuild", 2);

    parent.add_child(Arc::clone(&child)).unwrap();

    assert!(!project.try_add_target(&child));
    assert!(project.children().is_empty());
    assert_eq!(child.parent(), Some(parent.node_id()));
}

#[test]
fn recover_orphans_attaches_in_start_order() {
    let project = project();
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

    let late = project.targets().get_or_create_by_name("Late");
    late.set_start_time(start + Duration::from_secs(2));
    let placed = project.targets().create_or_update("Placed", 1);
    placed.set_start_time(start);
    let early = project.targets().create_or_update("Early", 2);
    early.set_start_time(start + Duration::from_secs(1));

    assert!(project.try_add_target(&placed));

    assert_eq!(project.recover_orphans(), 2);
    assert!(project.unparented_targets().is_empty());
    assert_eq!(project.recover_orphans(), 0);

    let children = project.children().snapshot();
    assert_eq!(children.len(), 3);
    assert!(Arc::ptr_eq(&children[0], &placed));
    assert!(Arc::ptr_eq(&children[1], &early));
    assert!(Arc::ptr_eq(&children[2], &late));
}
