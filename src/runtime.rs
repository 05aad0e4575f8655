//! The external-collaborator boundary.
//!
//! The interpreter core never runs containers or touches the memo lockfile
//! itself. It carries a per-evaluation [`Context`] through which platform
//! capabilities are reached: a [`Runtime`] that can run opaque [`Thunk`]s
//! and export [`ThunkPath`]s, a [`Memos`] store backing the `memo`
//! combiner, and the byte sink receiving `doc` output.
//!
//! The context also owns the concurrency primitives the boundary needs: an
//! interrupt flag for cancellation, a WaitGroup-style [`Runs`] counter that
//! background tasks decrement on completion, and a [`Trace`] of recently
//! evaluated combinations that is forked per task so each evaluation owns
//! its own trace.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::environment::Scope;
use crate::error::Error;
use crate::interpreter::{apply, trampoline, Cont, Step};
use crate::language::{list_from, Value};
use crate::stdlib::{def_native_fn, native_fn_value, native_op_value};
use crate::symbol::Symbol;

// ============================================================================
// Opaque values
// ============================================================================

/// A sandboxed process invocation. The core never interprets a thunk; it
/// only flows through evaluation as a value until a runtime consumes it.
#[derive(Clone, Debug, PartialEq)]
pub struct Thunk {
    /// Image in which to run the command, when the runtime needs one.
    pub image: Option<String>,
    /// The file or command to run.
    pub cmd: String,
    /// Arguments passed to the command.
    pub args: Vec<Value>,
}

impl Thunk {
    pub fn new(cmd: impl Into<String>) -> Self {
        Thunk {
            image: None,
            cmd: cmd.into(),
            args: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn into_value(self) -> Value {
        Value::Thunk(Arc::new(self))
    }

    pub fn from_value(value: &Value) -> Result<Arc<Thunk>, Error> {
        match value {
            Value::Thunk(thunk) => Ok(thunk.clone()),
            _ => Err(Error::decode(value, "thunk")),
        }
    }
}

impl fmt::Display for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<thunk: {}>", self.cmd)
    }
}

/// A path within (or produced by) a thunk's filesystem.
#[derive(Clone, Debug, PartialEq)]
pub struct ThunkPath {
    pub thunk: Thunk,
    pub path: String,
}

impl ThunkPath {
    pub fn into_value(self) -> Value {
        Value::ThunkPath(Arc::new(self))
    }

    pub fn from_value(value: &Value) -> Result<Arc<ThunkPath>, Error> {
        match value {
            Value::ThunkPath(path) => Ok(path.clone()),
            _ => Err(Error::decode(value, "thunk path")),
        }
    }
}

impl fmt::Display for ThunkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<thunk-path: {}>", self.path)
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Platform capability that can run thunks.
pub trait Runtime: Send + Sync {
    /// Run the thunk to completion, streaming its output to `out`.
    fn run(&self, ctx: &Context, out: &mut dyn Write, thunk: &Thunk) -> Result<(), Error>;

    /// Write the file tree at `path` to `out`.
    fn export_path(&self, ctx: &Context, out: &mut dyn Write, path: &ThunkPath)
        -> Result<(), Error>;
}

/// Where memoized calls are cached.
pub trait Memos: Send + Sync {
    fn store(&self, category: Symbol, input: &Value, output: &Value) -> Result<(), Error>;
    fn retrieve(&self, category: Symbol, input: &Value) -> Result<Option<Value>, Error>;
    fn remove(&self, category: Symbol, input: &Value) -> Result<(), Error>;
}

/// A memo store that remembers nothing.
pub struct NoopMemos;

impl Memos for NoopMemos {
    fn store(&self, _category: Symbol, _input: &Value, _output: &Value) -> Result<(), Error> {
        Ok(())
    }

    fn retrieve(&self, _category: Symbol, _input: &Value) -> Result<Option<Value>, Error> {
        Ok(None)
    }

    fn remove(&self, _category: Symbol, _input: &Value) -> Result<(), Error> {
        Ok(())
    }
}

/// An in-memory memo store. Entries are matched by structural equality of
/// (category, input).
#[derive(Default)]
pub struct TableMemos {
    entries: Mutex<Vec<(Symbol, Value, Value)>>,
}

impl TableMemos {
    pub fn new() -> Self {
        TableMemos::default()
    }
}

impl Memos for TableMemos {
    fn store(&self, category: Symbol, input: &Value, output: &Value) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(cat, inp, _)| *cat != category || inp != input);
        entries.push((category, input.clone(), output.clone()));
        Ok(())
    }

    fn retrieve(&self, category: Symbol, input: &Value) -> Result<Option<Value>, Error> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .find(|(cat, inp, _)| *cat == category && inp == input)
            .map(|(_, _, out)| out.clone()))
    }

    fn remove(&self, category: Symbol, input: &Value) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(cat, inp, _)| *cat != category || inp != input);
        Ok(())
    }
}

// ============================================================================
// Runs counter
// ============================================================================

/// WaitGroup-style counter of in-flight collaborator tasks.
#[derive(Default)]
pub struct Runs {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Runs {
    pub fn new() -> Self {
        Runs::default()
    }

    pub fn add(&self) {
        *self.count.lock().unwrap() += 1;
    }

    pub fn done(&self) {
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub fn active(&self) -> usize {
        *self.count.lock().unwrap()
    }

    /// Block until every registered task has finished.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.idle.wait(count).unwrap();
        }
    }
}

// ============================================================================
// Trace
// ============================================================================

const TRACE_CAPACITY: usize = 16;

/// Ring buffer of recently evaluated combinations, kept for error reports.
#[derive(Clone)]
pub struct Trace {
    frames: Arc<Mutex<VecDeque<Value>>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    pub fn new() -> Self {
        Trace {
            frames: Arc::new(Mutex::new(VecDeque::with_capacity(TRACE_CAPACITY))),
        }
    }

    pub fn record(&self, form: &Value) {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() == TRACE_CAPACITY {
            frames.pop_front();
        }
        frames.push_back(form.clone());
    }

    /// Oldest first.
    pub fn frames(&self) -> Vec<Value> {
        self.frames.lock().unwrap().iter().cloned().collect()
    }
}

// ============================================================================
// Context
// ============================================================================

/// Ambient state carried through one evaluation.
#[derive(Clone)]
pub struct Context {
    interrupt: Arc<AtomicBool>,
    runs: Arc<Runs>,
    trace: Trace,
    runtime: Option<Arc<dyn Runtime>>,
    memos: Option<Arc<dyn Memos>>,
    docs: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with no attached capabilities; `doc` output goes to
    /// stdout.
    pub fn new() -> Self {
        Context {
            interrupt: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(Runs::new()),
            trace: Trace::new(),
            runtime: None,
            memos: None,
            docs: Arc::new(Mutex::new(Box::new(io::stdout()))),
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_memos(mut self, memos: Arc<dyn Memos>) -> Self {
        self.memos = Some(memos);
        self
    }

    pub fn with_docs_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.docs = Arc::new(Mutex::new(writer));
        self
    }

    pub fn cancel(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Flag shared with e.g. a Ctrl+C handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn runs(&self) -> Arc<Runs> {
        self.runs.clone()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The same context with a fresh trace. Each background task owns its
    /// own evaluation trace.
    pub fn fork_trace(&self) -> Context {
        let mut forked = self.clone();
        forked.trace = Trace::new();
        forked
    }

    pub fn runtime(&self) -> Option<Arc<dyn Runtime>> {
        self.runtime.clone()
    }

    pub fn memos(&self) -> Option<Arc<dyn Memos>> {
        self.memos.clone()
    }

    pub(crate) fn write_docs(&self, text: &str) {
        let mut docs = self.docs.lock().unwrap();
        let _ = docs.write_all(text.as_bytes());
        let _ = docs.flush();
    }
}

// ============================================================================
// Collaborator combiners
// ============================================================================

fn required_runtime(ctx: &Context) -> Result<Arc<dyn Runtime>, Error> {
    ctx.runtime()
        .ok_or_else(|| Error::Runtime("no runtime attached to this context".to_string()))
}

fn required_memos(ctx: &Context) -> Result<Arc<dyn Memos>, Error> {
    ctx.memos()
        .ok_or_else(|| Error::Runtime("no memo store attached to this context".to_string()))
}

fn category_symbol(value: &Value) -> Result<Symbol, Error> {
    match value {
        Value::Symbol(sym) | Value::Keyword(sym) => Ok(*sym),
        _ => Err(Error::decode(value, "symbol")),
    }
}

fn run_native(ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("run", 1, args.len()));
    }
    let thunk = Thunk::from_value(&args[0])?;
    let runtime = required_runtime(ctx)?;
    debug!(thunk = %thunk, "running thunk");
    runtime.run(ctx, &mut io::stdout(), &thunk)?;
    Ok(Value::Null)
}

fn export_path_native(ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 1 {
        return Err(Error::arity_exact("export-path", 1, args.len()));
    }
    let path = ThunkPath::from_value(&args[0])?;
    let runtime = required_runtime(ctx)?;
    debug!(path = %path, "exporting path");
    runtime.export_path(ctx, &mut io::stdout(), &path)?;
    Ok(args[0].clone())
}

/// `(start thunk handler)` runs the thunk on its own thread and calls
/// `handler` with a boolean indicating success. Returns a combiner that
/// waits for the task and yields the handler's result; waiting polls the
/// interrupt flag so cancellation surfaces as `Cancelled`.
fn start_native(ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity_exact("start", 2, args.len()));
    }
    let thunk = Thunk::from_value(&args[0])?;
    let handler = args[1].clone();
    if !handler.is_combiner() {
        return Err(Error::typed("start", "combiner", &handler));
    }
    let runtime = required_runtime(ctx)?;

    // each task owns its own trace
    let task_ctx = ctx.fork_trace();
    task_ctx.runs().add();

    let (sender, receiver) = mpsc::channel::<Result<Value, Error>>();
    {
        let thunk = thunk.clone();
        thread::spawn(move || {
            let ok = runtime.run(&task_ctx, &mut io::sink(), &thunk).is_ok();
            let step = apply(
                &task_ctx,
                handler,
                list_from(vec![Value::Bool(ok)]),
                &Scope::new(),
                Cont::identity(),
            );
            let result = trampoline(&task_ctx, step);
            let _ = sender.send(result);
            task_ctx.runs().done();
        });
    }

    let receiver = Mutex::new(receiver);
    let settled: Mutex<Option<Result<Value, Error>>> = Mutex::new(None);
    let name = format!("wait: {}", thunk.cmd);
    Ok(native_fn_value(name, "[]", move |wait_ctx, _args, _scope, cont| {
        let mut settled = settled.lock().unwrap();
        if settled.is_none() {
            let receiver = receiver.lock().unwrap();
            loop {
                if wait_ctx.cancelled() {
                    return Step::Fail(Error::Cancelled);
                }
                match receiver.recv_timeout(Duration::from_millis(20)) {
                    Ok(result) => {
                        *settled = Some(result);
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        *settled = Some(Err(Error::Runtime("task disappeared".to_string())));
                        break;
                    }
                }
            }
        }
        match settled.clone().unwrap() {
            Ok(value) => cont.call(value),
            Err(err) => Step::Fail(err),
        }
    }))
}

/// `(memo f category)` composes `f` with a retrieve-then-store wrapper over
/// the context's memo store.
fn memo_native(_ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity_exact("memo", 2, args.len()));
    }
    let combiner = args[0].clone();
    if !combiner.is_combiner() {
        return Err(Error::typed("memo", "combiner", &combiner));
    }
    let category = category_symbol(&args[1])?;

    let inner = native_op_value(
        format!("memo: {category}"),
        "input",
        move |ctx: &Context, operands: Value, scope: &Scope, cont: Cont| {
            let memos = match required_memos(ctx) {
                Ok(memos) => memos,
                Err(err) => return Step::Fail(err),
            };
            match memos.retrieve(category, &operands) {
                Err(err) => Step::Fail(err),
                Ok(Some(cached)) => cont.call(cached),
                Ok(None) => {
                    let input = operands.clone();
                    let store_cont = Cont::new(move |result| {
                        if let Err(err) = memos.store(category, &input, &result) {
                            return Step::Fail(err);
                        }
                        cont.call(result)
                    });
                    apply(ctx, combiner.clone(), operands, scope, store_cont)
                }
            }
        },
    );
    Ok(Value::Applicative(Arc::new(inner)))
}

fn unmemo_native(ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != 2 {
        return Err(Error::arity_exact("unmemo", 2, args.len()));
    }
    let category = category_symbol(&args[0])?;
    let memos = required_memos(ctx)?;
    memos.remove(category, &args[1])?;
    Ok(Value::Null)
}

/// Register the collaborator combiners into a scope.
pub fn register_runtime(scope: &Scope) {
    def_native_fn(scope, "run", "[thunk]", run_native);
    def_native_fn(scope, "start", "[thunk handler]", start_native);
    def_native_fn(scope, "export-path", "[path]", export_path_native);
    def_native_fn(scope, "memo", "[f category]", memo_native);
    def_native_fn(scope, "unmemo", "[category input]", unmemo_native);
}
