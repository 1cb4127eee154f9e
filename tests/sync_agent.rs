use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use comfyui_forge_stack::{
    Error, FieldValue, ForgeConfig, GraphHost, GraphNode, Result, SyncAgent, SyncReport,
};

const SENTINEL: &str = "http://127.0.0.1:7860";

#[derive(Default)]
struct FakeNode {
    node_type: String,
    /// 部件名 -> (当前值, 默认值)
    widgets: RefCell<BTreeMap<String, (FieldValue, Option<FieldValue>)>>,
    refreshed: Cell<usize>,
    broken: bool,
}

impl FakeNode {
    fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            ..Default::default()
        }
    }

    fn with_url(self, value: FieldValue, default: Option<&str>) -> Self {
        self.widgets.borrow_mut().insert(
            "forge_url".to_string(),
            (value, default.map(FieldValue::text)),
        );
        self
    }

    fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    fn url(&self) -> Option<FieldValue> {
        self.widgets.borrow().get("forge_url").map(|(v, _)| v.clone())
    }
}

#[derive(Clone)]
struct NodeRef(Rc<FakeNode>);

impl GraphNode for NodeRef {
    fn node_type(&self) -> Option<String> {
        Some(self.0.node_type.clone())
    }

    fn widget_value(&self, name: &str) -> Option<FieldValue> {
        self.0.widgets.borrow().get(name).map(|(v, _)| v.clone())
    }

    fn widget_default(&self, name: &str) -> Option<FieldValue> {
        self.0.widgets.borrow().get(name).and_then(|(_, d)| d.clone())
    }

    fn set_widget_value(&self, name: &str, value: FieldValue) -> Result<bool> {
        if self.0.broken {
            return Err(Error::Host("widget is read only".to_string()));
        }
        match self.0.widgets.borrow_mut().get_mut(name) {
            Some((current, _)) => {
                *current = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn refresh_styles(&self) -> Result<()> {
        self.0.refreshed.set(self.0.refreshed.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
struct FakeGraph {
    nodes: Vec<NodeRef>,
    dirty: Cell<usize>,
}

impl FakeGraph {
    fn add(&mut self, node: FakeNode) -> Rc<FakeNode> {
        let node = Rc::new(node);
        self.nodes.push(NodeRef(node.clone()));
        node
    }
}

impl GraphHost for FakeGraph {
    type Node = NodeRef;

    fn nodes(&self) -> Vec<NodeRef> {
        self.nodes.clone()
    }

    fn mark_dirty(&self) {
        self.dirty.set(self.dirty.get() + 1);
    }
}

fn agent() -> SyncAgent {
    SyncAgent::new(ForgeConfig::default())
}

#[test]
fn test_propagation() {
    let mut graph = FakeGraph::default();
    graph.add(
        FakeNode::new("ForgeSampler")
            .with_url(FieldValue::text("http://10.0.0.9:7860"), Some(SENTINEL)),
    );
    let cn = graph.add(
        FakeNode::new("ForgeControlNetStack").with_url(FieldValue::text(SENTINEL), Some(SENTINEL)),
    );
    let lora = graph.add(FakeNode::new("ForgeLoraStack").with_url(FieldValue::text(""), None));

    let report = agent().tick(&graph);
    assert_eq!(report, SyncReport { updated: 2, failed: 0 });

    assert_eq!(cn.url(), Some(FieldValue::text("http://10.0.0.9:7860")));
    assert_eq!(lora.url(), Some(FieldValue::text("http://10.0.0.9:7860")));
    assert_eq!(cn.refreshed.get(), 1);
    assert_eq!(lora.refreshed.get(), 1);
    assert_eq!(graph.dirty.get(), 1);

    // 已一致时不再写入
    let report = agent().tick(&graph);
    assert_eq!(report, SyncReport::default());
    assert_eq!(cn.refreshed.get(), 1);
    assert_eq!(graph.dirty.get(), 1);
}

#[test]
fn test_user_value_is_not_clobbered() {
    let mut graph = FakeGraph::default();
    graph.add(FakeNode::new("ForgeSampler").with_url(FieldValue::text("http://10.0.0.9:7860"), None));
    let custom = graph.add(
        FakeNode::new("ForgeLoraStack")
            .with_url(FieldValue::text("http://192.168.1.20:7860"), Some(SENTINEL)),
    );

    let report = agent().tick(&graph);
    assert_eq!(report.updated, 0);
    assert_eq!(custom.url(), Some(FieldValue::text("http://192.168.1.20:7860")));
    assert_eq!(custom.refreshed.get(), 0);
    assert_eq!(graph.dirty.get(), 0);
}

#[test]
fn test_source_falls_back_to_default() {
    let mut graph = FakeGraph::default();
    graph.add(
        FakeNode::new("ForgeSampler")
            .with_url(FieldValue::Null, Some("http://10.0.0.7:7860")),
    );
    let cn = graph.add(FakeNode::new("ForgeControlNetStack").with_url(FieldValue::Null, None));

    assert_eq!(agent().tick(&graph).updated, 1);
    assert_eq!(cn.url(), Some(FieldValue::text("http://10.0.0.7:7860")));
}

#[test]
fn test_without_source_nothing_happens() {
    let mut graph = FakeGraph::default();
    let cn = graph.add(FakeNode::new("ForgeControlNetStack").with_url(FieldValue::text(""), None));
    graph.add(FakeNode::new("ForgeSampler").with_url(FieldValue::text(""), None));

    assert_eq!(agent().tick(&graph), SyncReport::default());
    assert_eq!(cn.url(), Some(FieldValue::text("")));
}

#[test]
fn test_failures_are_isolated() {
    let mut graph = FakeGraph::default();
    graph.add(FakeNode::new("ForgeSampler").with_url(FieldValue::text("http://10.0.0.9:7860"), None));
    graph.add(
        FakeNode::new("ForgeControlNetStack")
            .with_url(FieldValue::text(""), None)
            .broken(),
    );
    let other = graph.add(FakeNode::new("KSampler").with_url(FieldValue::text(""), None));
    let missing = graph.add(FakeNode::new("ForgeLoraStack"));
    let lora = graph.add(FakeNode::new("ForgeLoraStack").with_url(FieldValue::text(""), None));

    let report = agent().tick(&graph);
    assert_eq!(report, SyncReport { updated: 1, failed: 1 });
    assert_eq!(lora.url(), Some(FieldValue::text("http://10.0.0.9:7860")));
    assert_eq!(other.url(), Some(FieldValue::text("")));
    assert_eq!(missing.url(), None);
    assert_eq!(missing.refreshed.get(), 0);
}

#[test]
fn test_init_once() {
    assert!(SyncAgent::init());
    assert!(SyncAgent::is_initialized());
    assert!(!SyncAgent::init());
    assert!(SyncAgent::is_initialized());
}
