use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use proptest::{prop_assert, proptest};

use crate::{AttachError, Children, Container, Node, NodeID, TimedNode};

#[derive(Debug)]
struct Leaf {
    node: TimedNode,
}

impl Leaf {
    fn new(name: &str) -> Arc<Self> { Arc::new(Self { node: TimedNode::new(name) }) }
}

impl Node for Leaf {
    fn timed(&self) -> &TimedNode { &self.node }
}

#[derive(Debug)]
struct Folder {
    node: TimedNode,
    children: Children<Leaf>,
}

impl Folder {
    fn new(name: &str) -> Self {
        Self { node: TimedNode::new(name), children: Children::default() }
    }
}

impl Node for Folder {
    fn timed(&self) -> &TimedNode { &self.node }
}

impl Container for Folder {
    type Child = Leaf;

    fn children(&self) -> &Children<Leaf> { &self.children }
}

#[test]
fn add_child_records_parent() {
    let folder = Folder::new("folder");
    let leaf = Leaf::new("leaf");

    assert!(leaf.timed().is_rootless());

    folder.add_child(leaf.clone()).unwrap();

    assert_eq!(leaf.timed().parent(), Some(folder.timed().id()));
    assert_eq!(folder.children().len(), 1);
    assert!(Arc::ptr_eq(&folder.children().get(0).unwrap(), &leaf));
}

#[test]
fn second_attachment_is_rejected() {
    let first = Folder::new("first");
    let second = Folder::new("second");
    let leaf = Leaf::new("leaf");

    first.add_child(leaf.clone()).unwrap();

    assert_eq!(
        second.add_child(leaf.clone()),
        Err(AttachError::AlreadyAttached {
            child: leaf.timed().id(),
            parent: first.timed().id(),
        })
    );
    assert_eq!(
        first.add_child(leaf.clone()),
        Err(AttachError::AlreadyAttached {
            child: leaf.timed().id(),
            parent: first.timed().id(),
        })
    );

    assert_eq!(first.children().len(), 1);
    assert!(second.children().is_empty());
    assert_eq!(leaf.timed().parent(), Some(first.timed().id()));
}

#[test]
fn children_keep_attachment_order() {
    let folder = Folder::new("folder");
    let leaves = ["a", "b", "c"].map(Leaf::new);

    for leaf in leaves.iter().rev() {
        folder.add_child(leaf.clone()).unwrap();
    }

    let names = folder
        .children()
        .snapshot()
        .iter()
        .map(|x| x.timed().name().to_owned())
        .collect::<Vec<_>>();

    assert_eq!(names, ["c", "b", "a"]);
}

#[test]
fn duration_requires_both_ends() {
    let node = TimedNode::new("node");
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(10);

    assert_eq!(node.duration(), None);

    node.set_start_time(start);
    assert_eq!(node.duration(), None);

    node.set_end_time(start + Duration::from_millis(1500));
    assert_eq!(node.duration(), Some(Duration::from_millis(1500)));

    // clock went backwards
    node.set_end_time(start - Duration::from_secs(1));
    assert_eq!(node.duration(), None);
}

#[test]
fn attach_error_message() {
    let error = AttachError::AlreadyAttached {
        child: NodeID(4),
        parent: NodeID(2),
    };

    assert_eq!(error.to_string(), "node #4 is already attached to node #2");
    assert_eq!(
        AttachError::SelfAttachment(NodeID(7)).to_string(),
        "node #7 cannot be attached to itself"
    );
}

proptest! {
    #[test]
    fn fresh_ids_follow_creation_order(count in 1usize..64) {
        let ids = (0..count).map(|_| NodeID::fresh()).collect::<Vec<_>>();

        prop_assert!(ids.windows(2).all(|x| x[0] < x[1]));
    }
}
