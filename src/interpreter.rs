//! Continuation-passing evaluator and trampoline.
//!
//! `eval` never recurses on the host stack along the control path: it
//! returns a [`Step`], and [`trampoline`] drives `More` steps until a
//! terminal `Done` or `Fail`. Continuations defer their own invocation into
//! a step as well, so chains unwind iteratively. This is what makes the tail
//! positions (both `if` branches, the final form of `do`, an operative body)
//! genuinely tail-recursive: they are evaluated with the caller's
//! continuation, never a longer one.
//!
//! Native combiners re-enter evaluation by returning steps, and report
//! local failures as the `Fail` arm.

use std::sync::Arc;

use tracing::debug;

use crate::binding::bind;
use crate::environment::Scope;
use crate::error::Error;
use crate::language::{cons, list_from, proper_list, Value};
use crate::parser::Parser;
use crate::runtime::Context;

/// How many trampoline steps run between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

// ============================================================================
// Steps and continuations
// ============================================================================

/// A deferred computation, resumed by the trampoline.
pub type Resume = Box<dyn FnOnce() -> Step + Send>;

/// The result of one evaluation step.
pub enum Step {
    Done(Value),
    Fail(Error),
    More(Resume),
}

/// A continuation: what to do with a value once it is ready.
#[derive(Clone)]
pub struct Cont(Arc<dyn Fn(Value) -> Step + Send + Sync>);

impl Cont {
    pub fn new(f: impl Fn(Value) -> Step + Send + Sync + 'static) -> Self {
        Cont(Arc::new(f))
    }

    /// The terminal continuation.
    pub fn identity() -> Self {
        Cont::new(Step::Done)
    }

    /// Deliver a value. The invocation is deferred into a step so that long
    /// continuation chains unwind through the trampoline, not the host
    /// stack.
    pub fn call(&self, value: Value) -> Step {
        let f = self.0.clone();
        Step::More(Box::new(move || f(value)))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

pub fn eval(ctx: &Context, value: Value, scope: &Scope, cont: Cont) -> Step {
    match value {
        Value::Symbol(sym) => match scope.get(sym) {
            Some(found) => cont.call(found),
            None => Step::Fail(Error::UnboundSymbol(sym)),
        },

        // A combination: evaluate the head to a combiner, then apply it to
        // the unevaluated operand tree.
        Value::Pair(ref cell) => {
            ctx.trace().record(&value);
            let head = cell.head.clone();
            let tail = cell.tail.clone();
            let ctx2 = ctx.clone();
            let scope2 = scope.clone();
            Step::More(Box::new(move || {
                let apply_ctx = ctx2.clone();
                let apply_scope = scope2.clone();
                let apply_cont = Cont::new(move |combiner| {
                    apply(
                        &apply_ctx,
                        combiner,
                        tail.clone(),
                        &apply_scope,
                        cont.clone(),
                    )
                });
                eval(&ctx2, head, &scope2, apply_cont)
            }))
        }

        // The list literal: evaluate head and tail, yield a Pair.
        Value::InertPair(ref cell) => {
            let head_form = cell.head.clone();
            let tail_form = cell.tail.clone();
            let ctx2 = ctx.clone();
            let scope2 = scope.clone();
            Step::More(Box::new(move || {
                let tail_ctx = ctx2.clone();
                let tail_scope = scope2.clone();
                let head_cont = Cont::new(move |head| {
                    let ctx3 = tail_ctx.clone();
                    let scope3 = tail_scope.clone();
                    let form = tail_form.clone();
                    let cont2 = cont.clone();
                    Step::More(Box::new(move || {
                        let pair_cont =
                            Cont::new(move |tail| cont2.call(cons(head.clone(), tail)));
                        eval(&ctx3, form, &scope3, pair_cont)
                    }))
                });
                eval(&ctx2, head_form, &scope2, head_cont)
            }))
        }

        // A commented form: evaluate it, then attach the comment. The `_`
        // placeholder promotes it to scope commentary; a symbol result (the
        // shape `def` and friends return) makes it that binding's doc.
        Value::Annotated(ref cell) => {
            let comment = cell.comment.clone();
            let form = cell.form.clone();
            let is_commentary = matches!(form, Value::Ignore);
            let ctx2 = ctx.clone();
            let scope2 = scope.clone();
            Step::More(Box::new(move || {
                let attach_scope = scope2.clone();
                let attach_cont = Cont::new(move |value| {
                    if is_commentary {
                        attach_scope.add_commentary(comment.clone());
                    } else if let Value::Symbol(sym) = &value {
                        attach_scope.set_doc(*sym, comment.clone());
                    }
                    cont.call(value)
                });
                eval(&ctx2, form, &scope2, attach_cont)
            }))
        }

        // Everything else yields itself.
        other => cont.call(other),
    }
}

/// Apply a combiner to an operand tree in the dynamic scope.
pub fn apply(ctx: &Context, combiner: Value, operands: Value, scope: &Scope, cont: Cont) -> Step {
    match combiner {
        // Evaluate the arguments left to right, then forward the evaluated
        // list to the underlying combiner.
        Value::Applicative(inner) => {
            let forms = match proper_list(&operands) {
                Some(forms) => forms,
                None => {
                    return Step::Fail(Error::typed("call", "proper argument list", &operands))
                }
            };
            eval_args(ctx, forms, 0, Vec::new(), scope, (*inner).clone(), cont)
        }

        // Fresh scope under the operative's static scope; bind operands
        // against formals and the dynamic scope against the eformal; the
        // body runs in tail position.
        Value::Operative(cell) => {
            let local = cell.scope.child();
            if let Err(err) = bind(&local, &cell.formals, &operands) {
                return Step::Fail(err);
            }
            if let Err(err) = bind(&local, &cell.eformal, &Value::Env(scope.clone())) {
                return Step::Fail(err);
            }
            let ctx2 = ctx.clone();
            let body = cell.body.clone();
            Step::More(Box::new(move || eval(&ctx2, body, &local, cont)))
        }

        Value::Native(cell) => (cell.func)(ctx, operands, scope, cont),

        other => Step::Fail(Error::NotCombiner(other)),
    }
}

/// Evaluate `forms[idx..]` left to right, then apply `target` to the list.
fn eval_args(
    ctx: &Context,
    forms: Vec<Value>,
    idx: usize,
    acc: Vec<Value>,
    scope: &Scope,
    target: Value,
    cont: Cont,
) -> Step {
    if idx == forms.len() {
        return apply(ctx, target, list_from(acc), scope, cont);
    }
    let form = forms[idx].clone();
    let ctx2 = ctx.clone();
    let scope2 = scope.clone();
    eval(
        ctx,
        form,
        scope,
        Cont::new(move |value| {
            let mut next_acc = acc.clone();
            next_acc.push(value);
            let forms2 = forms.clone();
            let ctx3 = ctx2.clone();
            let scope3 = scope2.clone();
            let target2 = target.clone();
            let cont2 = cont.clone();
            Step::More(Box::new(move || {
                eval_args(&ctx3, forms2, idx + 1, next_acc, &scope3, target2, cont2)
            }))
        }),
    )
}

// ============================================================================
// Driving evaluation
// ============================================================================

/// Drive a step to a final value, checking for cancellation along the way.
pub fn trampoline(ctx: &Context, mut step: Step) -> Result<Value, Error> {
    let mut steps: u64 = 0;
    loop {
        match step {
            Step::Done(value) => return Ok(value),
            Step::Fail(err) => return Err(err),
            Step::More(resume) => {
                steps += 1;
                if steps % CANCEL_CHECK_INTERVAL == 0 && ctx.cancelled() {
                    return Err(Error::Cancelled);
                }
                step = resume();
            }
        }
    }
}

/// Evaluate a single form to completion.
pub fn evaluate(ctx: &Context, form: Value, scope: &Scope) -> Result<Value, Error> {
    trampoline(ctx, eval(ctx, form, scope, Cont::identity()))
}

/// Read and evaluate every top-level form of `source` in `scope`, returning
/// the value of the last one (`null` for empty input).
pub fn eval_source(ctx: &Context, scope: &Scope, source: &str) -> Result<Value, Error> {
    let mut parser = Parser::new(source)?;
    let mut result = Value::Null;
    while let Some(form) = parser.next_form()? {
        debug!(form = %form, "evaluating top-level form");
        result = evaluate(ctx, form, scope)?;
    }
    Ok(result)
}
