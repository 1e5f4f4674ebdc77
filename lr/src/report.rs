//! Human-readable descriptions of automaton construction failures.

use crate::{Error, ReduceReduceConflictError, ShiftReduceConflictError};

pub fn report(err: &Error) -> String {
  match err {
    Error::ReduceReduceConflict(err) => report_rr_conflict(err),
    Error::ShiftReduceConflict(err) => report_sr_conflict(err),
    Error::DeadState(state) => format!("state {} has neither a shift nor a reduce\n", state),
  }
}

fn state_items(items: &[String]) -> String {
  items.iter().map(|item| format!("  {}\n", item)).collect()
}

fn report_rr_conflict(
  err: &ReduceReduceConflictError
) -> String {
  format!(
    "reduce-reduce conflict at state {}:\n\n{}\nwhich can be reduced by:\n\n  {}\n\nor:\n\n  {}\n\nwhen the lookahead is {}\n",
    err.state,
    state_items(&err.state_items),
    err.reduce1,
    err.reduce2,
    err.lookahead,
  )
}

fn report_sr_conflict(
  err: &ShiftReduceConflictError
) -> String {
  format!(
    "shift-reduce conflict at state {}:\n\n{}\nwhich can shift {}\nor reduce by:\n\n  {}\n",
    err.state,
    state_items(&err.state_items),
    err.shift,
    err.reduce,
  )
}
