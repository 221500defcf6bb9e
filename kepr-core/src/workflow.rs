/* workflow.rs
 *
 * Copyright 2025 noobping
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 *
 * SPDX-License-Identifier: GPL-3.0
 */

//! A linear finite state machine: ordered triggers, each bound to a step,
//! run in sequence with an optional per-step retry policy and cooperative
//! cancellation.

pub use crate::error::WorkflowError;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, cooperative cancellation flag. Every step must check it before
/// and after I/O.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Rc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken { flag: Rc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), WorkflowError> {
        if self.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A single named transition in a workflow.
pub trait Step {
    fn name(&self) -> &str;
    fn execute(&mut self, token: &CancellationToken) -> Result<(), WorkflowError>;
}

/// `{max_attempts, prompt}`. `max_attempts <= 1` disables retry entirely.
/// Otherwise `execute` is retried until success; between attempts `prompt`
/// is asked whether to retry — `false` surfaces the last error immediately,
/// and a prompt error surfaces itself in place of the step's error.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub prompt: Box<dyn FnMut(&WorkflowError, u32) -> Result<bool, WorkflowError>>,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            prompt: Box::new(|_, _| Ok(false)),
        }
    }

    pub fn new(max_attempts: u32, prompt: impl FnMut(&WorkflowError, u32) -> Result<bool, WorkflowError> + 'static) -> Self {
        RetryPolicy { max_attempts, prompt: Box::new(prompt) }
    }
}

/// A [`Step`] built from a name and a closure, so a workflow's linear
/// sequence of triggers can be assembled without a bespoke struct per step.
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> Step for FnStep<F>
where
    F: FnMut(&CancellationToken) -> Result<(), WorkflowError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, token: &CancellationToken) -> Result<(), WorkflowError> {
        (self.f)(token)
    }
}

/// Build a [`Trigger`] with no retry policy from a name and a closure.
pub fn step(name: impl Into<String>, f: impl FnMut(&CancellationToken) -> Result<(), WorkflowError> + 'static) -> Trigger {
    Trigger::new(FnStep { name: name.into(), f })
}

/// Build a [`Trigger`] with a bound retry policy from a name and a closure.
pub fn step_with_retry(
    name: impl Into<String>,
    f: impl FnMut(&CancellationToken) -> Result<(), WorkflowError> + 'static,
    retry: RetryPolicy,
) -> Trigger {
    Trigger::with_retry(FnStep { name: name.into(), f }, retry)
}

/// One trigger: a named step plus its retry policy.
pub struct Trigger {
    pub step: Box<dyn Step>,
    pub retry: RetryPolicy,
}

impl Trigger {
    pub fn new(step: impl Step + 'static) -> Self {
        Trigger { step: Box::new(step), retry: RetryPolicy::none() }
    }

    pub fn with_retry(step: impl Step + 'static, retry: RetryPolicy) -> Self {
        Trigger { step: Box::new(step), retry }
    }
}

/// A linear workflow: `T1 .. Tn` fired in order.
pub struct Workflow {
    triggers: Vec<Trigger>,
}

impl Workflow {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Workflow { triggers }
    }

    pub fn run(&mut self, token: &CancellationToken) -> Result<(), WorkflowError> {
        for trigger in &mut self.triggers {
            token.check()?;
            run_with_retry(trigger, token)?;
            token.check()?;
        }
        Ok(())
    }
}

fn run_with_retry(trigger: &mut Trigger, token: &CancellationToken) -> Result<(), WorkflowError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match trigger.step.execute(token) {
            Ok(()) => return Ok(()),
            Err(WorkflowError::Cancelled) => return Err(WorkflowError::Cancelled),
            Err(e) => {
                if trigger.retry.max_attempts <= 1 || attempt >= trigger.retry.max_attempts {
                    if trigger.retry.max_attempts <= 1 {
                        return Err(e);
                    }
                    return Err(WorkflowError::MaxAttemptsExceeded(attempt, e.to_string()));
                }
                match (trigger.retry.prompt)(&e, attempt) {
                    Ok(true) => continue,
                    Ok(false) => return Err(e),
                    Err(prompt_err) => return Err(prompt_err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingStep {
        name: &'static str,
        fail_until: u32,
        calls: Rc<Cell<u32>>,
    }

    impl Step for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn execute(&mut self, _token: &CancellationToken) -> Result<(), WorkflowError> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n < self.fail_until {
                Err(WorkflowError::Other("transient".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn no_retry_surfaces_first_failure() {
        let calls = Rc::new(Cell::new(0));
        let step = CountingStep { name: "t1", fail_until: 2, calls: calls.clone() };
        let mut wf = Workflow::new(vec![Trigger::new(step)]);
        let err = wf.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::Other(_)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_until_success_then_stops() {
        let calls = Rc::new(Cell::new(0));
        let step = CountingStep { name: "t1", fail_until: 3, calls: calls.clone() };
        let retry = RetryPolicy::new(5, |_, _| Ok(true));
        let mut wf = Workflow::new(vec![Trigger::with_retry(step, retry)]);
        wf.run(&CancellationToken::new()).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausting_max_attempts_reports_count() {
        let calls = Rc::new(Cell::new(0));
        let step = CountingStep { name: "t1", fail_until: 100, calls: calls.clone() };
        let retry = RetryPolicy::new(3, |_, _| Ok(true));
        let mut wf = Workflow::new(vec![Trigger::with_retry(step, retry)]);
        let err = wf.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::MaxAttemptsExceeded(3, _)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn prompt_declining_retry_surfaces_error_immediately() {
        let calls = Rc::new(Cell::new(0));
        let step = CountingStep { name: "t1", fail_until: 100, calls: calls.clone() };
        let retry = RetryPolicy::new(5, |_, _| Ok(false));
        let mut wf = Workflow::new(vec![Trigger::with_retry(step, retry)]);
        wf.run(&CancellationToken::new()).unwrap_err();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cancelled_token_aborts_before_first_step() {
        let calls = Rc::new(Cell::new(0));
        let step = CountingStep { name: "t1", fail_until: 1, calls: calls.clone() };
        let token = CancellationToken::new();
        token.cancel();
        let mut wf = Workflow::new(vec![Trigger::new(step)]);
        let err = wf.run(&token).unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled));
        assert_eq!(calls.get(), 0);
    }
}
