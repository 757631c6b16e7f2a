//! Derived Computation Graph
//!
//! A static DAG whose sources are the registered fields and whose inner nodes
//! are the risk formulas. Setting a field recomputes, in topological order,
//! exactly the nodes downstream of it and notifies their subscribers.
//!
//! ```text
//! account-balance ─┐
//! risk-percent ────┴─► risk-in-usd ─► position-size-usd ─┬─► position-size-crypto
//! entry / stop / fees ───────────────────────┘            ├─► fee-in-usd
//!                                                          └─► trade-profit ─► ...
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;
use sizer_domain::{DerivedValue, FieldId, FieldValue};
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::formulas;

// =============================================================================
// Nodes
// =============================================================================

/// A formula node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivedNode {
    /// Dollar amount at risk
    RiskInUsd,
    /// Bullish / Bearish
    Trend,
    /// Notional position size in USD
    PositionSizeUsd,
    /// Position size in asset units
    PositionSizeCrypto,
    /// Entry plus stop fees in USD
    FeeInUsd,
    /// Relative stop distance
    EntryOverStoplossRatio,
    /// Relative take-profit distance
    EntryOverTakeProfitRatio,
    /// Profit at the take-profit, fees included
    TradeProfit,
    /// Profit over position size
    TradeProfitRatio,
    /// Profit over account balance
    RealProfitPercent,
    /// Reward ratio over risk ratio
    RiskRewardRatio,
}

/// Any node of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// Source node holding a field value
    Field(FieldId),
    /// Formula node
    Derived(DerivedNode),
}

use DerivedNode as D;
use FieldId as F;
use NodeId::{Derived, Field};

impl DerivedNode {
    /// All formula nodes in display order
    pub const ALL: [DerivedNode; 11] = [
        D::RiskInUsd,
        D::Trend,
        D::PositionSizeUsd,
        D::PositionSizeCrypto,
        D::FeeInUsd,
        D::EntryOverStoplossRatio,
        D::EntryOverTakeProfitRatio,
        D::TradeProfit,
        D::TradeProfitRatio,
        D::RealProfitPercent,
        D::RiskRewardRatio,
    ];

    /// Stable node name
    pub fn name(self) -> &'static str {
        match self {
            D::RiskInUsd => "risk-in-usd",
            D::Trend => "trend",
            D::PositionSizeUsd => "position-size-usd",
            D::PositionSizeCrypto => "position-size-crypto",
            D::FeeInUsd => "fee-in-usd",
            D::EntryOverStoplossRatio => "entry-over-stoploss-ratio",
            D::EntryOverTakeProfitRatio => "entry-over-take-profit-ratio",
            D::TradeProfit => "trade-profit",
            D::TradeProfitRatio => "trade-profit-ratio",
            D::RealProfitPercent => "real-profit-percent",
            D::RiskRewardRatio => "risk-reward-ratio",
        }
    }

    /// Display label
    pub fn title(self) -> &'static str {
        match self {
            D::RiskInUsd => "Risk USD:",
            D::Trend => "Trend:",
            D::PositionSizeUsd => "Position Size USD:",
            D::PositionSizeCrypto => "Position Size Crypto:",
            D::FeeInUsd => "Fee USD:",
            D::EntryOverStoplossRatio => "Entry/Stoploss Ratio:",
            D::EntryOverTakeProfitRatio => "Entry/Take Profit Ratio:",
            D::TradeProfit => "Trade Profit USD:",
            D::TradeProfitRatio => "Trade Profit Ratio:",
            D::RealProfitPercent => "Real Profit:",
            D::RiskRewardRatio => "Risk/Reward Ratio:",
        }
    }

    /// Declared upstream nodes, in the order `compute` reads them
    pub fn inputs(self) -> &'static [NodeId] {
        match self {
            D::RiskInUsd => &[Field(F::AccountBalance), Field(F::RiskPercent)],
            D::Trend => &[Field(F::EntryPrice), Field(F::Stoploss)],
            D::PositionSizeUsd => &[
                Derived(D::RiskInUsd),
                Field(F::EntryPrice),
                Field(F::Stoploss),
                Field(F::EntryFee),
                Field(F::StopFee),
            ],
            D::PositionSizeCrypto => &[Derived(D::PositionSizeUsd), Field(F::EntryPrice)],
            D::FeeInUsd => &[
                Derived(D::PositionSizeUsd),
                Field(F::EntryFee),
                Field(F::StopFee),
                Field(F::EntryPrice),
                Field(F::Stoploss),
            ],
            D::EntryOverStoplossRatio => &[Field(F::EntryPrice), Field(F::Stoploss)],
            D::EntryOverTakeProfitRatio => &[Field(F::EntryPrice), Field(F::TakeProfit)],
            D::TradeProfit => &[
                Derived(D::PositionSizeUsd),
                Field(F::EntryPrice),
                Field(F::TakeProfit),
                Field(F::EntryFee),
                Field(F::TakeProfitFee),
            ],
            D::TradeProfitRatio => &[Derived(D::TradeProfit), Derived(D::PositionSizeUsd)],
            D::RealProfitPercent => &[Derived(D::TradeProfit), Field(F::AccountBalance)],
            D::RiskRewardRatio => &[
                Derived(D::EntryOverTakeProfitRatio),
                Derived(D::EntryOverStoplossRatio),
            ],
        }
    }

    /// Evaluate the formula from the numeric values of `inputs()`, in order
    fn compute(self, args: &[f64]) -> DerivedValue {
        let arg = |i: usize| args.get(i).copied().unwrap_or(f64::NAN);
        match self {
            D::RiskInUsd => formulas::risk_in_usd(arg(0), arg(1)).into(),
            D::Trend => formulas::trend(arg(0), arg(1)).into(),
            D::PositionSizeUsd => {
                formulas::position_size_usd(arg(0), arg(1), arg(2), arg(3), arg(4)).into()
            },
            D::PositionSizeCrypto => formulas::position_size_crypto(arg(0), arg(1)).into(),
            D::FeeInUsd => formulas::fee_in_usd(arg(0), arg(1), arg(2), arg(3), arg(4)).into(),
            D::EntryOverStoplossRatio => formulas::entry_over_stoploss_ratio(arg(0), arg(1)).into(),
            D::EntryOverTakeProfitRatio => {
                formulas::entry_over_take_profit_ratio(arg(0), arg(1)).into()
            },
            D::TradeProfit => {
                formulas::trade_profit(arg(0), arg(1), arg(2), arg(3), arg(4)).into()
            },
            D::TradeProfitRatio => formulas::trade_profit_ratio(arg(0), arg(1)).into(),
            D::RealProfitPercent => formulas::real_profit_percent(arg(0), arg(1)).into(),
            D::RiskRewardRatio => formulas::risk_reward_ratio(arg(0), arg(1)).into(),
        }
    }
}

impl fmt::Display for DerivedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field(field) => write!(f, "{}", field),
            Derived(node) => write!(f, "{}", node),
        }
    }
}

/// Order `nodes` so every node comes after its derived inputs (Kahn).
///
/// # Errors
/// Returns `EngineError::Cycle` if the declarations contain a cycle.
pub fn topological_order<I>(nodes: &[DerivedNode], inputs: I) -> EngineResult<Vec<DerivedNode>>
where
    I: Fn(DerivedNode) -> Vec<NodeId>,
{
    let mut pending: BTreeMap<DerivedNode, usize> = BTreeMap::new();
    let mut dependents: HashMap<DerivedNode, Vec<DerivedNode>> = HashMap::new();

    for &node in nodes {
        let derived_inputs: Vec<DerivedNode> = inputs(node)
            .into_iter()
            .filter_map(|input| match input {
                Derived(upstream) => Some(upstream),
                Field(_) => None,
            })
            .collect();
        pending.insert(node, derived_inputs.len());
        for upstream in derived_inputs {
            dependents.entry(upstream).or_default().push(node);
        }
    }

    let mut ready: VecDeque<DerivedNode> =
        pending.iter().filter(|(_, count)| **count == 0).map(|(node, _)| *node).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_front() {
        order.push(node);
        for &dependent in dependents.get(&node).into_iter().flatten() {
            if let Some(count) = pending.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck = nodes.iter().find(|node| !order.contains(*node)).copied();
        return Err(EngineError::Cycle {
            node: stuck.map(|node| node.name().to_string()).unwrap_or_default(),
        });
    }

    Ok(order)
}

// =============================================================================
// Snapshot
// =============================================================================

/// Values of every formula node at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DerivedSnapshot(BTreeMap<DerivedNode, DerivedValue>);

impl DerivedSnapshot {
    /// Value of one node (`Undefined` if never computed)
    pub fn get(&self, node: DerivedNode) -> DerivedValue {
        self.0.get(&node).copied().unwrap_or_default()
    }

    /// Numeric value of one node
    pub fn number(&self, node: DerivedNode) -> f64 {
        self.get(node).as_number()
    }

    /// Iterate nodes in display order
    pub fn iter(&self) -> impl Iterator<Item = (DerivedNode, DerivedValue)> + '_ {
        self.0.iter().map(|(node, value)| (*node, *value))
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// A value published by a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change<'a> {
    /// A field received a value
    Field(FieldId, &'a FieldValue),
    /// A formula node was recomputed
    Derived(DerivedNode, &'a DerivedValue),
}

impl Change<'_> {
    /// Node that published this change
    pub fn node(&self) -> NodeId {
        match self {
            Change::Field(field, _) => Field(*field),
            Change::Derived(node, _) => Derived(*node),
        }
    }
}

/// Handle returned by [`Graph::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer callback
pub type Callback = Box<dyn FnMut(&Change<'_>) + Send>;

struct Subscriber {
    id: SubscriptionId,
    node: NodeId,
    callback: Callback,
}

// =============================================================================
// Graph
// =============================================================================

/// The live computation graph.
///
/// Owns the current value of every field and formula node. Formula nodes can
/// only change through [`Graph::set_field`].
pub struct Graph {
    fields: BTreeMap<FieldId, FieldValue>,
    derived: DerivedSnapshot,
    order: Vec<DerivedNode>,
    dependents: HashMap<NodeId, Vec<DerivedNode>>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
}

impl Graph {
    /// Build the graph, seed the given field values and compute every node.
    ///
    /// Fields missing from `seed` start empty.
    ///
    /// # Errors
    /// Returns `EngineError::Cycle` if the node declarations are cyclic.
    pub fn new(seed: impl IntoIterator<Item = (FieldId, FieldValue)>) -> EngineResult<Self> {
        let order = topological_order(&DerivedNode::ALL, |node| node.inputs().to_vec())?;

        let mut dependents: HashMap<NodeId, Vec<DerivedNode>> = HashMap::new();
        for node in DerivedNode::ALL {
            for &input in node.inputs() {
                dependents.entry(input).or_default().push(node);
            }
        }

        let mut fields: BTreeMap<FieldId, FieldValue> =
            FieldId::ALL.iter().map(|&field| (field, FieldValue::empty())).collect();
        fields.extend(seed);

        let mut graph = Self {
            fields,
            derived: DerivedSnapshot::default(),
            order,
            dependents,
            subscribers: Vec::new(),
            next_subscription: 0,
        };

        for node in graph.order.clone() {
            let value = graph.evaluate(node);
            graph.derived.0.insert(node, value);
        }

        debug!(nodes = graph.order.len(), "Computation graph built");
        Ok(graph)
    }

    /// Current value of a field
    pub fn field(&self, field: FieldId) -> &FieldValue {
        // Every FieldId is inserted in `new`
        &self.fields[&field]
    }

    /// Current value of a formula node
    pub fn value(&self, node: DerivedNode) -> DerivedValue {
        self.derived.get(node)
    }

    /// Current value of every formula node
    pub fn snapshot(&self) -> &DerivedSnapshot {
        &self.derived
    }

    /// Topological evaluation order
    pub fn order(&self) -> &[DerivedNode] {
        &self.order
    }

    /// Set a field and recompute everything downstream of it.
    ///
    /// Subscribers of the field are notified first, then subscribers of each
    /// recomputed node in topological order. Returns the recomputed nodes.
    pub fn set_field(&mut self, field: FieldId, value: FieldValue) -> Vec<DerivedNode> {
        trace!(field = %field, value = %value, "Field set");
        self.fields.insert(field, value);
        if let Some(value) = self.fields.get(&field) {
            let change = Change::Field(field, value);
            Self::notify(&mut self.subscribers, &change);
        }

        let affected = self.downstream_of(Field(field));
        let mut recomputed = Vec::with_capacity(affected.len());

        for node in self.order.clone() {
            if !affected.contains(&node) {
                continue;
            }
            let value = self.evaluate(node);
            self.derived.0.insert(node, value);
            Self::notify(&mut self.subscribers, &Change::Derived(node, &value));
            recomputed.push(node);
        }

        recomputed
    }

    /// Register a callback for every value published by `node`
    pub fn subscribe(&mut self, node: NodeId, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, node, callback });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Every formula node reachable from `source`
    fn downstream_of(&self, source: NodeId) -> HashSet<DerivedNode> {
        let mut affected = HashSet::new();
        let mut queue = VecDeque::from([source]);

        while let Some(node) = queue.pop_front() {
            for &dependent in self.dependents.get(&node).into_iter().flatten() {
                if affected.insert(dependent) {
                    queue.push_back(Derived(dependent));
                }
            }
        }

        affected
    }

    fn evaluate(&self, node: DerivedNode) -> DerivedValue {
        let args: Vec<f64> = node
            .inputs()
            .iter()
            .map(|input| match input {
                Field(field) => self.field(*field).as_number(),
                Derived(upstream) => self.derived.number(*upstream),
            })
            .collect();
        node.compute(&args)
    }

    fn notify(subscribers: &mut [Subscriber], change: &Change<'_>) {
        let node = change.node();
        for subscriber in subscribers.iter_mut().filter(|s| s.node == node) {
            (subscriber.callback)(change);
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("fields", &self.fields)
            .field("derived", &self.derived)
            .field("order", &self.order)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sizer_domain::Trend;
    use std::sync::{Arc, Mutex};

    fn seeded(values: &[(FieldId, &str)]) -> Graph {
        Graph::new(values.iter().map(|(field, raw)| (*field, FieldValue::new(*raw)))).unwrap()
    }

    #[test]
    fn test_order_is_topological() {
        let graph = seeded(&[]);
        let position = |node: DerivedNode| graph.order().iter().position(|n| *n == node).unwrap();

        for node in DerivedNode::ALL {
            for input in node.inputs() {
                if let Derived(upstream) = input {
                    assert!(position(*upstream) < position(node), "{upstream} before {node}");
                }
            }
        }
    }

    #[test]
    fn test_cycle_is_rejected() {
        let cyclic = |node: DerivedNode| match node {
            D::TradeProfit => vec![Derived(D::TradeProfitRatio)],
            D::TradeProfitRatio => vec![Derived(D::TradeProfit)],
            _ => vec![],
        };
        let err = topological_order(&[D::TradeProfit, D::TradeProfitRatio], cyclic).unwrap_err();
        assert!(matches!(err, EngineError::Cycle { .. }));
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let result = topological_order(&[D::RiskInUsd], |_| vec![Derived(D::RiskInUsd)]);
        assert_eq!(
            result,
            Err(EngineError::Cycle {
                node: "risk-in-usd".to_string()
            })
        );
    }

    #[test]
    fn test_seeded_values_are_computed() {
        let graph = seeded(&[
            (F::AccountBalance, "1000"),
            (F::RiskPercent, "2"),
            (F::EntryPrice, "100"),
            (F::Stoploss, "90"),
            (F::EntryFee, "1"),
            (F::StopFee, "1"),
        ]);

        assert_eq!(graph.value(D::RiskInUsd), DerivedValue::Number(20.0));
        assert_eq!(graph.value(D::Trend), DerivedValue::Trend(Trend::Bullish));
        assert!((graph.value(D::PositionSizeUsd).as_number() - 168.07).abs() < 0.01);
        assert!((graph.value(D::PositionSizeCrypto).as_number() - 1.6807).abs() < 0.0001);
    }

    #[test]
    fn test_set_field_recomputes_only_downstream() {
        let mut graph = seeded(&[(F::AccountBalance, "1000"), (F::RiskPercent, "2")]);

        let recomputed: HashSet<DerivedNode> =
            graph.set_field(F::TakeProfit, FieldValue::new("120")).into_iter().collect();
        let expected: HashSet<DerivedNode> = [
            D::EntryOverTakeProfitRatio,
            D::TradeProfit,
            D::TradeProfitRatio,
            D::RealProfitPercent,
            D::RiskRewardRatio,
        ]
        .into_iter()
        .collect();
        assert_eq!(recomputed, expected);

        let recomputed = graph.set_field(F::RiskPercent, FieldValue::new("3"));
        assert!(recomputed.contains(&D::RiskInUsd));
        assert!(recomputed.contains(&D::PositionSizeUsd));
        assert!(recomputed.contains(&D::RealProfitPercent));
        assert!(!recomputed.contains(&D::Trend));
        assert_eq!(graph.value(D::RiskInUsd), DerivedValue::Number(30.0));
    }

    #[test]
    fn test_trend_follows_inputs() {
        let mut graph = seeded(&[(F::Stoploss, "90")]);
        assert!(graph.value(D::Trend).is_undefined());

        graph.set_field(F::EntryPrice, FieldValue::new("100"));
        assert_eq!(graph.value(D::Trend).as_trend(), Some(Trend::Bullish));

        graph.set_field(F::Stoploss, FieldValue::new("110"));
        assert_eq!(graph.value(D::Trend).as_trend(), Some(Trend::Bearish));
        assert!((graph.value(D::EntryOverStoplossRatio).as_number() - 0.0909).abs() < 0.0001);

        graph.set_field(F::EntryPrice, FieldValue::empty());
        assert!(graph.value(D::Trend).is_undefined());
    }

    #[test]
    fn test_subscribers_are_notified_in_order() {
        let mut graph = seeded(&[(F::AccountBalance, "1000"), (F::RiskPercent, "2")]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for node in [Field(F::RiskPercent), Derived(D::RiskInUsd), Derived(D::PositionSizeUsd)] {
            let seen = seen.clone();
            graph.subscribe(
                node,
                Box::new(move |change: &Change<'_>| seen.lock().unwrap().push(change.node())),
            );
        }

        graph.set_field(F::RiskPercent, FieldValue::new("1"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Field(F::RiskPercent), Derived(D::RiskInUsd), Derived(D::PositionSizeUsd)]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut graph = seeded(&[]);
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let id = graph.subscribe(
            Derived(D::RiskInUsd),
            Box::new(move |_: &Change<'_>| *counter.lock().unwrap() += 1),
        );

        graph.set_field(F::AccountBalance, FieldValue::new("500"));
        assert!(graph.unsubscribe(id));
        assert!(!graph.unsubscribe(id));
        graph.set_field(F::AccountBalance, FieldValue::new("600"));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_malformed_input_propagates_nan() {
        let mut graph = seeded(&[(F::AccountBalance, "1000"), (F::RiskPercent, "2")]);
        graph.set_field(F::AccountBalance, FieldValue::new("lots"));

        assert!(graph.value(D::RiskInUsd).as_number().is_nan());
        assert!(graph.value(D::PositionSizeUsd).as_number().is_nan());
    }

    #[test]
    fn test_snapshot_serializes_by_node_name() {
        let graph = seeded(&[(F::AccountBalance, "1000"), (F::RiskPercent, "2")]);
        let json = serde_json::to_value(graph.snapshot()).unwrap();

        assert_eq!(json["risk-in-usd"], 20.0);
        // NaN has no JSON number form
        assert!(json["position-size-usd"].is_null());
        assert!(json["trend"].is_null());
    }
}
