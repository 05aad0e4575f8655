//! The ground environment.
//!
//! Native combiners are registered here, and the derived layer of the
//! standard library (`std.perch`, embedded at compile time) is evaluated
//! into the ground scope on startup. User code runs in a child of ground.

use std::sync::Arc;

use tracing::debug;

use crate::binding::bind;
use crate::environment::{DocEntry, Scope};
use crate::error::Error;
use crate::interpreter::{eval, eval_source, Cont, Step};
use crate::language::{cons, proper_list, NativeCell, OperativeCell, Value};
use crate::runtime::{register_runtime, Context};
use crate::symbol::Symbol;

/// The derived standard library, read at interpreter start.
const BOOTSTRAP: &str = include_str!("std.perch");

// ============================================================================
// Registration helpers
// ============================================================================

/// A native operative as a value. Public so collaborators can hand custom
/// combiners into a scope.
pub fn native_op_value(
    name: impl Into<String>,
    formals: impl Into<String>,
    f: impl Fn(&Context, Value, &Scope, Cont) -> Step + Send + Sync + 'static,
) -> Value {
    Value::Native(Arc::new(NativeCell::new(name, formals, f)))
}

/// A native applicative as a value: a wrapped native operative whose
/// operand tree arrives as the already-evaluated argument list.
pub fn native_fn_value(
    name: impl Into<String>,
    formals: impl Into<String>,
    f: impl Fn(&Context, Vec<Value>, &Scope, Cont) -> Step + Send + Sync + 'static,
) -> Value {
    let name = name.into();
    let op_name = name.clone();
    let inner = native_op_value(name, formals, move |ctx, operands, scope, cont| {
        match proper_list(&operands) {
            Some(args) => f(ctx, args, scope, cont),
            None => Step::Fail(Error::typed(
                op_name.clone(),
                "proper argument list",
                &operands,
            )),
        }
    });
    Value::Applicative(Arc::new(inner))
}

pub(crate) fn def_native_op(
    scope: &Scope,
    name: &str,
    formals: &str,
    f: impl Fn(&Context, Value, &Scope, Cont) -> Step + Send + Sync + 'static,
) {
    scope.def(Symbol::new(name), native_op_value(name, formals, f));
}

/// Register a simple applicative: arguments in, value or error out.
pub(crate) fn def_native_fn(
    scope: &Scope,
    name: &str,
    formals: &str,
    f: impl Fn(&Context, Vec<Value>) -> Result<Value, Error> + Send + Sync + 'static,
) {
    scope.def(
        Symbol::new(name),
        native_fn_value(name, formals, move |ctx, args, _scope, cont| {
            match f(ctx, args) {
                Ok(value) => cont.call(value),
                Err(err) => Step::Fail(err),
            }
        }),
    );
}

/// Register an applicative that continues evaluation itself (e.g. `eval`).
pub(crate) fn def_native_fn_cont(
    scope: &Scope,
    name: &str,
    formals: &str,
    f: impl Fn(&Context, Vec<Value>, &Scope, Cont) -> Step + Send + Sync + 'static,
) {
    scope.def(Symbol::new(name), native_fn_value(name, formals, f));
}

// ============================================================================
// Predicate registry
// ============================================================================

/// The unary predicates, in the order `doc` prints their tags: the specific
/// combiner kinds come before `combiner?` itself.
pub(crate) const PREDICATES: &[(&str, fn(&Value) -> bool)] = &[
    ("null?", |v| matches!(v, Value::Null)),
    ("boolean?", |v| matches!(v, Value::Bool(_))),
    ("number?", |v| matches!(v, Value::Int(_))),
    ("string?", |v| matches!(v, Value::String(_))),
    ("symbol?", |v| matches!(v, Value::Symbol(_))),
    ("keyword?", |v| matches!(v, Value::Keyword(_))),
    ("empty?", |v| {
        matches!(v, Value::Null | Value::Empty) || matches!(v, Value::String(s) if s.is_empty())
    }),
    ("pair?", Value::is_pair),
    ("list?", Value::is_list),
    ("env?", |v| matches!(v, Value::Env(_))),
    ("applicative?", Value::is_applicative),
    ("operative?", Value::is_operative),
    ("combiner?", Value::is_combiner),
];

/// The predicate tags a value satisfies, in registry order.
pub(crate) fn value_tags(value: &Value) -> Vec<&'static str> {
    PREDICATES
        .iter()
        .filter(|(_, pred)| pred(value))
        .map(|(name, _)| *name)
        .collect()
}

// ============================================================================
// Operatives
// ============================================================================

fn quote_native(_ctx: &Context, operands: Value, _scope: &Scope, cont: Cont) -> Step {
    let forms = match proper_list(&operands) {
        Some(forms) => forms,
        None => return Step::Fail(Error::typed("quote", "proper operand list", &operands)),
    };
    if forms.len() != 1 {
        return Step::Fail(Error::arity_exact("quote", 1, forms.len()));
    }
    cont.call(forms[0].clone())
}

fn if_native(ctx: &Context, operands: Value, scope: &Scope, cont: Cont) -> Step {
    let forms = match proper_list(&operands) {
        Some(forms) => forms,
        None => return Step::Fail(Error::typed("if", "proper operand list", &operands)),
    };
    if forms.len() != 3 {
        return Step::Fail(Error::arity_exact("if", 3, forms.len()));
    }
    let cond = forms[0].clone();
    let yes = forms[1].clone();
    let no = forms[2].clone();
    let ctx2 = ctx.clone();
    let scope2 = scope.clone();
    eval(
        ctx,
        cond,
        scope,
        Cont::new(move |value| {
            // both branches are in tail position: they run with the
            // caller's continuation
            let branch = if value.is_truthy() { yes.clone() } else { no.clone() };
            let ctx3 = ctx2.clone();
            let scope3 = scope2.clone();
            let cont2 = cont.clone();
            Step::More(Box::new(move || eval(&ctx3, branch, &scope3, cont2)))
        }),
    )
}

fn def_native(ctx: &Context, operands: Value, scope: &Scope, cont: Cont) -> Step {
    let forms = match proper_list(&operands) {
        Some(forms) => forms,
        None => return Step::Fail(Error::typed("def", "proper operand list", &operands)),
    };
    if forms.len() != 2 {
        return Step::Fail(Error::arity_exact("def", 2, forms.len()));
    }
    let pattern = forms[0].clone();
    let expr = forms[1].clone();
    let scope2 = scope.clone();
    eval(
        ctx,
        expr,
        scope,
        Cont::new(move |value| match bind(&scope2, &pattern, &value) {
            Ok(()) => cont.call(pattern.clone()),
            Err(err) => Step::Fail(err),
        }),
    )
}

/// `(op formals eformal body…)`. The operand tree is destructured in two
/// stages so mismatches report the sub-pattern still unmatched; a
/// multi-form body is wrapped in an implicit `do`.
fn op_native(_ctx: &Context, operands: Value, scope: &Scope, cont: Cont) -> Step {
    let split = |value: &Value| match value {
        Value::Pair(cell) | Value::InertPair(cell) => Some((cell.head.clone(), cell.tail.clone())),
        _ => None,
    };

    let (formals, rest) = match split(&operands) {
        Some(parts) => parts,
        None => {
            return Step::Fail(Error::BindMismatch {
                need: cons(
                    Value::symbol("formals"),
                    cons(Value::symbol("eformal"), Value::symbol("body")),
                ),
                have: operands,
            })
        }
    };
    let (eformal, body) = match split(&rest) {
        Some(parts) => parts,
        None => {
            return Step::Fail(Error::BindMismatch {
                need: cons(Value::symbol("eformal"), Value::symbol("body")),
                have: rest,
            })
        }
    };
    let (first_form, more) = match split(&body) {
        Some(parts) => parts,
        None => {
            return Step::Fail(Error::BindMismatch {
                need: cons(Value::symbol("f"), Value::Ignore),
                have: body,
            })
        }
    };

    let body_value = if matches!(more, Value::Empty) {
        first_form
    } else {
        cons(Value::symbol("do"), body)
    };

    cont.call(Value::Operative(Arc::new(OperativeCell {
        formals,
        eformal,
        body: body_value,
        scope: scope.clone(),
    })))
}

// ============================================================================
// doc
// ============================================================================

const DOC_SEPARATOR: &str = "--------------------------------------------------";

fn combiner_formals(value: &Value) -> Option<String> {
    match value {
        Value::Operative(cell) => Some(cell.formals.to_string()),
        Value::Native(cell) => Some(cell.formals.clone()),
        Value::Applicative(inner) => combiner_formals(inner),
        _ => None,
    }
}

fn write_doc_record(out: &mut String, name: &str, value: &Value, doc: Option<&str>) {
    out.push_str(DOC_SEPARATOR);
    out.push('\n');
    out.push_str(name);
    for tag in value_tags(value) {
        out.push(' ');
        out.push_str(tag);
    }
    out.push('\n');
    if let Some(formals) = combiner_formals(value) {
        out.push_str("args: ");
        out.push_str(&formals);
        out.push('\n');
    }
    out.push('\n');
    if let Some(doc) = doc {
        out.push_str(doc);
        out.push('\n');
    }
    out.push('\n');
}

fn write_commentary(out: &mut String, text: &str) {
    out.push_str(DOC_SEPARATOR);
    out.push('\n');
    out.push_str(text);
    out.push('\n');
    out.push('\n');
}

fn write_scope_docs(out: &mut String, scope: &Scope) {
    for entry in scope.entries() {
        match entry {
            DocEntry::Commentary(text) => write_commentary(out, &text),
            DocEntry::Binding(sym) => {
                if let Some(value) = scope.get(sym) {
                    sym.with_name(|name| {
                        write_doc_record(out, name, &value, scope.doc(sym).as_deref())
                    });
                }
            }
        }
    }
    for parent in scope.parents() {
        write_scope_docs(out, &parent);
    }
}

/// `doc` is an operative: it needs the symbols themselves, not their
/// values, to print the binding records. With no operands it replays the
/// scope chain's commentary and documented bindings in definition order.
fn doc_native(ctx: &Context, operands: Value, scope: &Scope, cont: Cont) -> Step {
    let forms = match proper_list(&operands) {
        Some(forms) => forms,
        None => return Step::Fail(Error::typed("doc", "proper operand list", &operands)),
    };

    let mut out = String::new();
    if forms.is_empty() {
        write_scope_docs(&mut out, scope);
    } else {
        for form in &forms {
            let sym = match form {
                Value::Symbol(sym) => *sym,
                other => return Step::Fail(Error::typed("doc", "symbol", other)),
            };
            let value = match scope.get(sym) {
                Some(value) => value,
                None => return Step::Fail(Error::UnboundSymbol(sym)),
            };
            sym.with_name(|name| {
                write_doc_record(&mut out, name, &value, scope.doc(sym).as_deref())
            });
        }
    }
    ctx.write_docs(&out);
    cont.call(Value::Null)
}

// ============================================================================
// Applicatives
// ============================================================================

fn int_args(op: &str, args: &[Value]) -> Result<Vec<i64>, Error> {
    args.iter()
        .map(|value| match value {
            Value::Int(n) => Ok(*n),
            other => Err(Error::typed(op, "number", other)),
        })
        .collect()
}

fn pair_parts(op: &str, value: &Value) -> Result<(Value, Value), Error> {
    match value {
        Value::Pair(cell) | Value::InertPair(cell) => Ok((cell.head.clone(), cell.tail.clone())),
        other => Err(Error::typed(op, "pair", other)),
    }
}

fn wrap_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("wrap", 1, args.len()));
    }
    if !args[0].is_combiner() {
        return Err(Error::typed("wrap", "combiner", &args[0]));
    }
    Ok(Value::Applicative(Arc::new(args[0].clone())))
}

fn unwrap_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("unwrap", 1, args.len()));
    }
    match &args[0] {
        Value::Applicative(inner) => Ok((**inner).clone()),
        other => Err(Error::typed("unwrap", "applicative", other)),
    }
}

fn cons_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity_exact("cons", 2, args.len()));
    }
    Ok(cons(args[0].clone(), args[1].clone()))
}

fn eval_native(ctx: &Context, args: Vec<Value>, _scope: &Scope, cont: Cont) -> Step {
    if args.len() != 2 {
        return Step::Fail(Error::arity_exact("eval", 2, args.len()));
    }
    let target = match &args[1] {
        Value::Env(scope) => scope.clone(),
        other => return Step::Fail(Error::typed("eval", "env", other)),
    };
    let form = args[0].clone();
    let ctx2 = ctx.clone();
    // tail position: the form runs with the caller's continuation
    Step::More(Box::new(move || eval(&ctx2, form, &target, cont)))
}

fn make_env_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let mut parents = Vec::with_capacity(args.len());
    for arg in &args {
        match arg {
            Value::Env(scope) => parents.push(scope.clone()),
            other => return Err(Error::typed("make-env", "env", other)),
        }
    }
    Ok(Value::Env(Scope::with_parents(parents)))
}

fn add_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args("+", &args)?;
    Ok(Value::Int(nums.iter().fold(0i64, |a, n| a.wrapping_add(*n))))
}

fn mul_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args("*", &args)?;
    Ok(Value::Int(nums.iter().fold(1i64, |a, n| a.wrapping_mul(*n))))
}

fn sub_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args("-", &args)?;
    match nums.split_first() {
        None => Err(Error::arity_min("-", 1, 0)),
        Some((first, [])) => Ok(Value::Int(first.wrapping_neg())),
        Some((first, rest)) => Ok(Value::Int(
            rest.iter().fold(*first, |a, n| a.wrapping_sub(*n)),
        )),
    }
}

fn max_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args("max", &args)?;
    nums.into_iter()
        .max()
        .map(Value::Int)
        .ok_or_else(|| Error::arity_min("max", 1, 0))
}

fn min_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args("min", &args)?;
    nums.into_iter()
        .min()
        .map(Value::Int)
        .ok_or_else(|| Error::arity_min("min", 1, 0))
}

fn equal_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.is_empty() {
        return Err(Error::arity_min("=?", 1, 0));
    }
    Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn relation(op: &'static str, rel: fn(i64, i64) -> bool, args: Vec<Value>) -> Result<Value, Error> {
    let nums = int_args(op, &args)?;
    if nums.is_empty() {
        return Err(Error::arity_min(op, 1, 0));
    }
    Ok(Value::Bool(
        nums.windows(2).all(|pair| rel(pair[0], pair[1])),
    ))
}

fn first_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("first", 1, args.len()));
    }
    Ok(pair_parts("first", &args[0])?.0)
}

fn rest_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("rest", 1, args.len()));
    }
    Ok(pair_parts("rest", &args[0])?.1)
}

fn second_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("second", 1, args.len()));
    }
    let (_, tail) = pair_parts("second", &args[0])?;
    Ok(pair_parts("second", &tail)?.0)
}

fn third_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("third", 1, args.len()));
    }
    let (_, tail) = pair_parts("third", &args[0])?;
    let (_, tail) = pair_parts("third", &tail)?;
    Ok(pair_parts("third", &tail)?.0)
}

fn length_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("length", 1, args.len()));
    }
    match proper_list(&args[0]) {
        Some(items) => Ok(Value::Int(items.len() as i64)),
        None => Err(Error::typed("length", "list", &args[0])),
    }
}

fn list_star_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    match args.split_last() {
        None => Err(Error::arity_min("list*", 1, 0)),
        Some((tail, heads)) => Ok(heads
            .iter()
            .rev()
            .fold(tail.clone(), |tail, head| cons(head.clone(), tail))),
    }
}

fn load_native(ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity_exact("load", 2, args.len()));
    }
    let target = match &args[0] {
        Value::Env(scope) => scope.clone(),
        other => return Err(Error::typed("load", "env", other)),
    };
    let path = match &args[1] {
        Value::String(path) => path.clone(),
        other => return Err(Error::typed("load", "string", other)),
    };
    let source = std::fs::read_to_string(&path)
        .map_err(|err| Error::Runtime(format!("load {path}: {err}")))?;
    eval_source(ctx, &target, &source)?;
    Ok(args[0].clone())
}

// ============================================================================
// Ground construction
// ============================================================================

fn register_ground(scope: &Scope) {
    for (name, pred) in PREDICATES {
        let pred = *pred;
        let op_name = *name;
        def_native_fn(scope, name, "[value]", move |_ctx, args| {
            if args.len() != 1 {
                return Err(Error::arity_exact(op_name, 1, args.len()));
            }
            Ok(Value::Bool(pred(&args[0])))
        });
    }

    def_native_op(scope, "quote", "[form]", quote_native);
    def_native_op(scope, "if", "[cond yes no]", if_native);
    def_native_op(scope, "def", "[pattern value]", def_native);
    def_native_op(scope, "op", "[formals eformal . body]", op_native);
    def_native_op(scope, "doc", "[. symbols]", doc_native);

    def_native_fn(scope, "wrap", "[combiner]", wrap_native);
    def_native_fn(scope, "unwrap", "[applicative]", unwrap_native);
    def_native_fn(scope, "cons", "[head tail]", cons_native);
    def_native_fn_cont(scope, "eval", "[form env]", eval_native);
    def_native_fn(scope, "make-env", "[. parents]", make_env_native);

    def_native_fn(scope, "+", "[. nums]", add_native);
    def_native_fn(scope, "-", "[num . nums]", sub_native);
    def_native_fn(scope, "*", "[. nums]", mul_native);
    def_native_fn(scope, "max", "[num . nums]", max_native);
    def_native_fn(scope, "min", "[num . nums]", min_native);

    def_native_fn(scope, "=?", "[value . values]", equal_native);
    def_native_fn(scope, ">?", "[num . nums]", |_ctx, args| {
        relation(">?", |a, b| a > b, args)
    });
    def_native_fn(scope, "<?", "[num . nums]", |_ctx, args| {
        relation("<?", |a, b| a < b, args)
    });
    def_native_fn(scope, ">=?", "[num . nums]", |_ctx, args| {
        relation(">=?", |a, b| a >= b, args)
    });
    def_native_fn(scope, "<=?", "[num . nums]", |_ctx, args| {
        relation("<=?", |a, b| a <= b, args)
    });

    def_native_fn(scope, "first", "[pair]", first_native);
    def_native_fn(scope, "rest", "[pair]", rest_native);
    def_native_fn(scope, "second", "[list]", second_native);
    def_native_fn(scope, "third", "[list]", third_native);
    def_native_fn(scope, "length", "[list]", length_native);
    def_native_fn(scope, "list*", "[value . values]", list_star_native);
    def_native_fn(scope, "load", "[env path]", load_native);
}

/// Build a fresh ground scope: natives plus the evaluated bootstrap.
pub fn ground_scope(ctx: &Context) -> Result<Scope, Error> {
    let ground = Scope::new();
    register_ground(&ground);
    register_runtime(&ground);
    debug!("evaluating embedded bootstrap");
    eval_source(ctx, &ground, BOOTSTRAP)?;
    Ok(ground)
}

/// A fresh user scope whose single parent is ground.
pub fn standard_scope(ctx: &Context) -> Result<Scope, Error> {
    Ok(ground_scope(ctx)?.child())
}
