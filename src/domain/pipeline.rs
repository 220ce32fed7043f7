//! Run orchestration.
//!
//! Stages: evaluate every instance, pair with the stored signals, persist the
//! new previous table, then per symbol in sorted order submit the primary
//! orders, record the ledger and reconcile. A failure inside one symbol is
//! reported and the loop moves on.

use crate::domain::error::SigtraderError;
use crate::domain::execution::{ExecutionConfig, ExecutionGateway, ExecutionOutcome};
use crate::domain::indicator::{evaluate, IndicatorFrame};
use crate::domain::ledger::{aggregate_fills, attribute};
use crate::domain::message;
use crate::domain::reconcile::{corrective_order, target_position};
use crate::domain::signal::{InstanceKey, Signal, SignalPoint};
use crate::domain::signal_history::{record_run, SignalHistory};
use crate::domain::sizing::{size_orders, BetSizeTable};
use crate::domain::strategy::{StrategyInstance, StrategyKind};
use crate::domain::transition::{tally_by_symbol, BucketTally, SignalTransition};
use crate::ports::broker_port::BrokerPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::series_port::SeriesPort;
use crate::ports::signal_store_port::SignalStorePort;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// An instance that produced no signal this run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstance {
    pub key: InstanceKey,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Evaluated signals plus the instances that must carry their previous value.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub points: Vec<SignalPoint>,
    pub frames: Vec<(InstanceKey, IndicatorFrame)>,
    pub carried: Vec<InstanceKey>,
    pub skipped: Vec<SkippedInstance>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub transitions: Vec<SignalTransition>,
    pub orders: Vec<ExecutionOutcome>,
    pub corrections: Vec<ExecutionOutcome>,
    pub failures: Vec<SymbolFailure>,
    pub skipped: Vec<SkippedInstance>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline<'a> {
    pub series: &'a dyn SeriesPort,
    pub store: &'a dyn SignalStorePort,
    pub broker: &'a dyn BrokerPort,
    pub ledger: &'a dyn LedgerPort,
    pub notifier: &'a dyn NotifyPort,
    pub bet_sizes: &'a BetSizeTable,
    pub execution: ExecutionConfig,
}

impl<'a> Pipeline<'a> {
    fn gateway(&self) -> ExecutionGateway<'a> {
        ExecutionGateway::new(self.broker, self.ledger, self.execution.clone())
    }

    fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(text) {
            warn!(error = %e, "notification not queued");
        }
    }

    /// Computes the latest signal of every instance. With `persist` the
    /// recomputed frames are written through the series port.
    pub fn evaluate_instances(&self, instances: &[StrategyInstance], persist: bool) -> Evaluation {
        let mut out = Evaluation::default();

        for inst in instances {
            let key = inst.key();
            let skip = |out: &mut Evaluation, reason: String| {
                warn!(instance = %key, reason = %reason, "instance skipped");
                out.carried.push(key.clone());
                out.skipped.push(SkippedInstance {
                    key: key.clone(),
                    reason,
                });
            };

            let kind = match StrategyKind::resolve(inst) {
                Ok(Some(kind)) => kind,
                Ok(None) => {
                    skip(&mut out, format!("unsupported strategy kind '{}'", inst.kind));
                    continue;
                }
                Err(e) => {
                    skip(&mut out, e.to_string());
                    continue;
                }
            };

            let series = match self.series.load_series(inst) {
                Ok(s) => s,
                Err(e) => {
                    skip(&mut out, e.to_string());
                    continue;
                }
            };

            let frame = evaluate(&kind, inst.mode, &series);
            let Some(latest) = frame.latest() else {
                skip(&mut out, "empty series".to_string());
                continue;
            };
            let point = SignalPoint {
                timestamp: latest.timestamp,
                key: key.clone(),
                saved_csv: inst.frame_name(),
                signal: latest.pos,
            };

            if persist {
                if let Err(e) = self.series.store_frame(inst, &frame) {
                    warn!(instance = %key, error = %e, "failed to store indicator frame");
                }
            }
            info!(instance = %key, kind = %kind, signal = %point.signal, at = %point.timestamp, "evaluated");
            out.points.push(point);
            out.frames.push((key, frame));
        }
        out
    }

    /// Full run. Fails only when the previous-signal table cannot be saved;
    /// every later failure is confined to its symbol and reported.
    pub fn run(&self, instances: &[StrategyInstance]) -> Result<RunReport, SigtraderError> {
        let evaluation = self.evaluate_instances(instances, true);
        let history = SignalHistory::load(self.store);
        let transitions = history.transitions(&evaluation.points, &evaluation.carried);

        record_run(
            self.store,
            &history,
            &evaluation.points,
            &evaluation.carried,
            &transitions,
        )?;
        self.notify(&message::transition_summary(&transitions));

        let mut report = RunReport {
            transitions: transitions.clone(),
            skipped: evaluation.skipped,
            ..RunReport::default()
        };

        let gateway = self.gateway();
        for (symbol, tally) in tally_by_symbol(&transitions) {
            let related: Vec<&SignalTransition> =
                transitions.iter().filter(|t| t.symbol() == symbol).collect();
            if let Err(e) = self.trade_symbol(&gateway, &symbol, &tally, &related, &mut report) {
                error!(symbol = %symbol, error = %e, "symbol aborted");
                report.failures.push(SymbolFailure {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }

        info!(
            orders = report.orders.len(),
            corrections = report.corrections.len(),
            failures = report.failures.len(),
            "run finished"
        );
        Ok(report)
    }

    fn trade_symbol(
        &self,
        gateway: &ExecutionGateway<'_>,
        symbol: &str,
        tally: &BucketTally,
        related: &[&SignalTransition],
        report: &mut RunReport,
    ) -> Result<(), SigtraderError> {
        let Some(base) = self.bet_sizes.get(symbol) else {
            warn!(symbol, "no bet size configured, no orders");
            return Ok(());
        };

        let orders = size_orders(symbol, tally, base, self.execution.qty_precision);
        for order in &orders {
            let outcome = gateway.execute(order)?;
            let shared: Vec<SignalTransition> = related
                .iter()
                .filter(|t| Some(t.bucket()) == order.bucket())
                .map(|t| (*t).clone())
                .collect();

            match aggregate_fills(&outcome.fills) {
                Some(aggregate) => {
                    let rows = attribute(&aggregate, &shared);
                    if let Err(e) = self.ledger.append_rows(&rows) {
                        error!(symbol, order_id = %outcome.order_id, error = %e, "failed to append ledger rows");
                    }
                }
                None => warn!(symbol, order_id = %outcome.order_id, "order has no fills, ledger not updated"),
            }
            report.orders.push(outcome);
        }

        if !orders.is_empty() {
            self.notify_position(symbol, "pos_status (AFTER)");
        }

        let currents: Vec<Signal> = related.iter().map(|t| t.current).collect();
        if let Some(correction) = self.reconcile_symbol(gateway, symbol, &currents, base)? {
            report.corrections.push(correction);
        }
        Ok(())
    }

    /// Brings the live position to `sum(signals) × base`. Returns the
    /// corrective execution when one was needed.
    pub fn reconcile_symbol(
        &self,
        gateway: &ExecutionGateway<'_>,
        symbol: &str,
        signals: &[Signal],
        base: f64,
    ) -> Result<Option<ExecutionOutcome>, SigtraderError> {
        let precision = self.execution.qty_precision;
        let target = target_position(signals, base, precision);
        let live = self
            .broker
            .fetch_position(symbol)
            .map_err(|e| SigtraderError::broker(symbol, e))?;

        let Some(order) = corrective_order(target, &live, precision) else {
            info!(symbol, target, live = live.size, "no adjustment required");
            return Ok(None);
        };

        info!(symbol, target, live = live.size, side = %order.side, notional = order.notional, "correcting position");
        let outcome = gateway.execute(&order)?;
        self.notify_position(symbol, "pos_status (ADJ)");
        Ok(Some(outcome))
    }

    /// Reconciliation alone, from the stored previous signals.
    pub fn reconcile_only(&self, instances: &[StrategyInstance]) -> RunReport {
        let history = SignalHistory::load(self.store);
        let mut by_symbol: BTreeMap<String, Vec<Signal>> = BTreeMap::new();
        for inst in instances {
            let signal = history
                .previous(&inst.key())
                .map(|p| p.signal)
                .unwrap_or_default();
            by_symbol.entry(inst.symbol.clone()).or_default().push(signal);
        }

        let gateway = self.gateway();
        let mut report = RunReport::default();
        for (symbol, signals) in by_symbol {
            let Some(base) = self.bet_sizes.get(&symbol) else {
                warn!(symbol = %symbol, "no bet size configured, not reconciled");
                continue;
            };
            match self.reconcile_symbol(&gateway, &symbol, &signals, base) {
                Ok(Some(outcome)) => report.corrections.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "reconcile failed");
                    report.failures.push(SymbolFailure {
                        symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    fn notify_position(&self, symbol: &str, title: &str) {
        match self.broker.fetch_position(symbol) {
            Ok(mut position) => {
                if position.balance.is_none() {
                    position.balance = self.broker.fetch_balance().ok();
                }
                self.notify(&message::position_status(title, &position));
            }
            Err(e) => warn!(symbol, error = %e, "position status unavailable"),
        }
    }
}
