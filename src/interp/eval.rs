//! Tree-walking evaluation of parsed function bodies

use serde_json::Value;
use std::collections::HashMap;

use crate::error::Error;
use crate::interp::ast::{DeclKind, Expr, Stmt};
use crate::interp::builtins::{self, ARRAY_METHOD_MAP, BUILTIN_MAP, METHOD_MAP};
use crate::interp::value::{self, Entries, Heap, JsValue};
use crate::js_op;

// Copying strings and converting to JSON cost a step per this many bytes
const BYTES_PER_STEP: usize = 64;

#[derive(Debug)]
struct Binding {
    value: JsValue,
    constant: bool,
}

/// How a statement finished
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(JsValue),
    Break,
    Continue,
}

/// Something an assignment can write to
#[derive(Debug)]
enum Place {
    Binding(String),
    Property(JsValue, String),
}

/// State for one call of an interpreted function.
///
/// The first scope is the function scope: parameters and `var`
/// declarations live there. Blocks and `for` loops push inner scopes for
/// `let` and `const`.
#[derive(Debug)]
pub struct Interpreter {
    scopes: Vec<HashMap<String, Binding>>,
    yields: Vec<Value>,
    heap: Heap,
    steps: usize,
    step_limit: usize,
}

/// Collect the names declared with `var` anywhere in a body.
fn hoisted_names(stmts: &[Stmt], names: &mut Vec<String>) {
    stmts.iter().for_each(|stmt| match stmt {
        Stmt::Declare {
            kind: DeclKind::Var,
            decls,
        } => names.extend(decls.iter().map(|(name, _)| name.clone())),
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            hoisted_names(std::slice::from_ref(&**consequent), names);
            if let Some(alternate) = alternate {
                hoisted_names(std::slice::from_ref(&**alternate), names);
            }
        }
        Stmt::While { body, .. } => hoisted_names(std::slice::from_ref(&**body), names),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                hoisted_names(std::slice::from_ref(&**init), names);
            }
            hoisted_names(std::slice::from_ref(&**body), names);
        }
        Stmt::Block(inner) => hoisted_names(inner, names),
        _ => {}
    })
}

fn type_error(value: &Value, operation: &str, reason: &str) -> Error {
    Error::InvalidArgument {
        value: value.clone(),
        operation: operation.into(),
        reason: reason.into(),
    }
}

/// An array index, if the key is one in canonical form.
fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|idx| idx.to_string() == key)
}

/// Read `object[key]`, with missing properties reading as null.
pub fn get_property(object: &JsValue, key: &str) -> Result<JsValue, Error> {
    match object {
        JsValue::Primitive(Value::Null) => Err(type_error(
            &Value::from(key),
            "property access",
            "Cannot read properties of null or undefined",
        )),
        JsValue::Primitive(Value::String(s)) => Ok(JsValue::Primitive(match array_index(key) {
            Some(idx) => s
                .chars()
                .nth(idx)
                .map(|ch| Value::String(ch.to_string()))
                .unwrap_or(Value::Null),
            None if key == "length" => Value::from(s.chars().count() as u64),
            None => Value::Null,
        })),
        JsValue::Primitive(_) => Ok(JsValue::null()),
        JsValue::Array(node) => {
            let items = node.borrow();
            Ok(match array_index(key) {
                Some(idx) => items.get(idx).cloned().unwrap_or_else(JsValue::null),
                None if key == "length" => JsValue::Primitive(Value::from(items.len() as u64)),
                None => JsValue::null(),
            })
        }
        JsValue::Object(node) => Ok(node.borrow().get(key).cloned().unwrap_or_else(JsValue::null)),
    }
}

/// Write `object[key]`. Writing past the end of an array fills the gap
/// with null.
fn set_property(heap: &mut Heap, object: &JsValue, key: String, value: JsValue) -> Result<(), Error> {
    match object {
        JsValue::Array(node) => {
            let idx = array_index(&key).ok_or_else(|| {
                type_error(&Value::String(key.clone()), "assignment", "Arrays only accept index keys")
            })?;
            value::check_array_len(idx.saturating_add(1), "assignment")?;
            let mut items = node.borrow_mut();
            if idx >= items.len() {
                heap.account(idx + 1 - items.len());
                items.resize(idx + 1, JsValue::null());
            }
            items[idx] = value;
            Ok(())
        }
        JsValue::Object(node) => {
            if node.borrow_mut().insert(key, value).is_none() {
                heap.account(1);
            }
            Ok(())
        }
        JsValue::Primitive(primitive) => Err(type_error(
            primitive,
            "assignment",
            "Cannot set properties of a primitive value",
        )),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => match property.as_ref() {
            Expr::Literal(Value::String(name)) => format!("{}.{}", describe(object), name),
            _ => format!("{}[...]", describe(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => String::from("<expression>"),
    }
}

impl Interpreter {
    pub fn new(step_limit: usize) -> Self {
        Interpreter {
            scopes: vec![HashMap::new()],
            yields: Vec::new(),
            heap: Heap::default(),
            steps: 0,
            step_limit,
        }
    }

    /// Bind a name in the function scope.
    pub fn bind(&mut self, name: &str, value: JsValue) {
        self.scopes[0].insert(
            name.to_string(),
            Binding {
                value,
                constant: false,
            },
        );
    }

    /// Bring an argument into this call's heap.
    pub fn adopt(&mut self, value: Value) -> Result<JsValue, Error> {
        self.heap.adopt(value)
    }

    /// Values yielded so far, in order.
    pub fn into_yields(self) -> Vec<Value> {
        self.yields
    }

    /// Run a function body to completion, returning its return value.
    pub fn execute(&mut self, body: &[Stmt]) -> Result<Value, Error> {
        let mut names = Vec::new();
        hoisted_names(body, &mut names);
        names.into_iter().for_each(|name| {
            self.scopes[0].entry(name).or_insert(Binding {
                value: JsValue::null(),
                constant: false,
            });
        });
        match self.exec_all(body)? {
            Flow::Return(value) => self.json(&value),
            Flow::Normal => Ok(Value::Null),
            Flow::Break | Flow::Continue => Err(Error::Syntax {
                offset: 0,
                reason: "'break' or 'continue' outside of a loop".into(),
            }),
        }
    }

    fn tick(&mut self) -> Result<(), Error> {
        self.steps += 1;
        match self.steps.saturating_add(self.heap.allocated()) > self.step_limit {
            true => Err(Error::StepLimitExceeded(self.step_limit)),
            false => Ok(()),
        }
    }

    fn charge_bytes(&mut self, bytes: usize) {
        self.steps = self.steps.saturating_add(bytes / BYTES_PER_STEP);
    }

    /// Copy a value out as JSON.
    fn json(&mut self, value: &JsValue) -> Result<Value, Error> {
        match value {
            JsValue::Primitive(primitive) => Ok(primitive.clone()),
            compound => {
                let (json, size) = compound.to_json()?;
                self.charge_bytes(size);
                Ok(json)
            }
        }
    }

    fn json_all(&mut self, values: &[JsValue]) -> Result<Vec<Value>, Error> {
        values.iter().map(|value| self.json(value)).collect()
    }

    fn scoped<T>(
        &mut self,
        run: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.scopes.push(HashMap::new());
        let rv = run(self);
        self.scopes.pop();
        rv
    }

    fn find(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    fn lookup(&self, name: &str) -> Result<JsValue, Error> {
        self.find(name)
            .map(|binding| binding.value.clone())
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))
    }

    /// `Math.max` style paths whose root is not a local binding.
    fn global_path(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Ident(name) if self.find(name).is_none() => Some(name.clone()),
            Expr::Member { object, property } => match property.as_ref() {
                Expr::Literal(Value::String(name)) => self
                    .global_path(object)
                    .map(|path| format!("{}.{}", path, name)),
                _ => None,
            },
            _ => None,
        }
    }

    // =================================================================
    // Statements
    // =================================================================

    fn exec_all(&mut self, stmts: &[Stmt]) -> Result<Flow, Error> {
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, Error> {
        self.tick()?;
        match stmt {
            Stmt::Declare { kind, decls } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => JsValue::null(),
                    };
                    match kind {
                        DeclKind::Var if init.is_none() => {
                            self.scopes[0].entry(name.clone()).or_insert(Binding {
                                value,
                                constant: false,
                            });
                        }
                        DeclKind::Var => self.bind(name, value),
                        DeclKind::Let | DeclKind::Const => {
                            let binding = Binding {
                                value,
                                constant: *kind == DeclKind::Const,
                            };
                            if let Some(scope) = self.scopes.last_mut() {
                                scope.insert(name.clone(), binding);
                            }
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => self.eval(expr).map(|_| Flow::Normal),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => JsValue::null(),
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test)?.truthy() {
                    self.tick()?;
                    match self.exec(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.exec(init)?;
                }
                loop {
                    this.tick()?;
                    if let Some(test) = test {
                        if !this.eval(test)?.truthy() {
                            break;
                        }
                    }
                    match this.exec(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        this.eval(update)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Block(stmts) => self.scoped(|this| this.exec_all(stmts)),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    // =================================================================
    // Expressions
    // =================================================================

    /// Evaluate an expression. Every string it produces is checked
    /// against the length limit and charged by size.
    pub fn eval(&mut self, expr: &Expr) -> Result<JsValue, Error> {
        let value = self.eval_expr(expr)?;
        if let JsValue::Primitive(Value::String(s)) = &value {
            value::check_string_len(s.len(), "build string")?;
            let len = s.len();
            self.charge_bytes(len);
        }
        Ok(value)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<JsValue, Error> {
        match expr {
            Expr::Literal(value) => self.heap.adopt(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => {
                let items = self.eval_all(items)?;
                self.heap.array(items)
            }
            Expr::Object(entries) => {
                let mut map = Entries::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(self.heap.object(map))
            }
            Expr::Member { object, property } => {
                if let Some(constant) = self
                    .global_path(expr)
                    .and_then(|path| builtins::constant(&path))
                {
                    return Ok(JsValue::Primitive(constant));
                }
                let object = self.eval(object)?;
                let key = self.eval(property)?;
                let key = self.property_key(&key)?;
                get_property(&object, &key)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => self.unary(op, operand),
            Expr::Update { op, prefix, target } => {
                let place = self.place(target)?;
                let old = self.read_place(&place)?;
                let old = self.json(&old)?;
                let old = js_op::to_number(&old)
                    .ok_or_else(|| type_error(&old, op, "Could not convert value to number."))?;
                let new = match *op {
                    "++" => old + 1.0,
                    _ => old - 1.0,
                };
                let new = js_op::to_number_value(new, op)?;
                self.write_place(place, JsValue::Primitive(new.clone()))?;
                match prefix {
                    true => Ok(JsValue::Primitive(new)),
                    false => js_op::to_number_value(old, op).map(JsValue::Primitive),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.operate(op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match *op {
                    "&&" => !left.truthy(),
                    "||" => left.truthy(),
                    _ => !left.is_null(),
                };
                match short_circuit {
                    true => Ok(left),
                    false => self.eval(right),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => match self.eval(test)?.truthy() {
                true => self.eval(consequent),
                false => self.eval(alternate),
            },
            Expr::Assign { op, target, value } => {
                let place = self.place(target)?;
                let new = match *op {
                    "=" => self.eval(value)?,
                    _ => {
                        let old = self.read_place(&place)?;
                        let rhs = self.eval(value)?;
                        // "+=" applies "+", and so on
                        self.operate(&op[..op.len() - 1], &old, &rhs)?
                    }
                };
                self.write_place(place, new.clone())?;
                Ok(new)
            }
            Expr::Yield(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => JsValue::null(),
                };
                let value = self.json(&value)?;
                self.yields.push(value);
                // Nothing is ever sent back into a generator
                Ok(JsValue::null())
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<JsValue>, Error> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn property_key(&mut self, key: &JsValue) -> Result<String, Error> {
        let key = self.json(key)?;
        Ok(js_op::to_string(&key))
    }

    fn unary(&mut self, op: &str, operand: &Expr) -> Result<JsValue, Error> {
        if op == "typeof" {
            if let Some(path) = self.global_path(operand) {
                if BUILTIN_MAP.contains_key(path.as_str()) {
                    return Ok(JsValue::Primitive(Value::from("function")));
                }
                if let Expr::Ident(_) = operand {
                    return Ok(JsValue::Primitive(Value::from("undefined")));
                }
            }
            let value = self.eval(operand)?;
            return Ok(JsValue::Primitive(Value::from(value.type_of())));
        }
        let value = self.eval(operand)?;
        if op == "!" {
            return Ok(JsValue::from(!value.truthy()));
        }
        let value = self.json(&value)?;
        let num = match op {
            "-" => js_op::to_negative(&value)?,
            _ => js_op::to_number(&value)
                .ok_or_else(|| type_error(&value, "unary +", "Could not convert value to number."))?,
        };
        js_op::to_number_value(num, &format!("unary {}", op)).map(JsValue::Primitive)
    }

    /// Apply a binary operator. Equality sees arrays and objects by
    /// identity; everything else works on JSON copies of the operands.
    fn operate(&mut self, op: &str, left: &JsValue, right: &JsValue) -> Result<JsValue, Error> {
        match op {
            "===" => return Ok(JsValue::from(left.strict_eq(right))),
            "!==" => return Ok(JsValue::from(!left.strict_eq(right))),
            "==" | "!=" if left.is_compound() && right.is_compound() => {
                return Ok(JsValue::from(left.strict_eq(right) == (op == "==")))
            }
            _ => {}
        }
        let left = self.json(left)?;
        let right = self.json(right)?;
        binary(op, &left, &right).map(JsValue::Primitive)
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<JsValue, Error> {
        if let Some(builtin) = self
            .global_path(callee)
            .and_then(|path| BUILTIN_MAP.get(path.as_str()))
        {
            let args = self.eval_all(args)?;
            let args = self.json_all(&args)?;
            let result = builtin.call(&args)?;
            return self.heap.adopt(result);
        }
        if let Expr::Member { object, property } = callee {
            if let Expr::Literal(Value::String(name)) = property.as_ref() {
                let receiver = self.eval(object)?;
                let args = self.eval_all(args)?;
                if let JsValue::Array(array) = &receiver {
                    if let Some(method) = ARRAY_METHOD_MAP.get(name.as_str()) {
                        return method.call(&mut self.heap, array, &args);
                    }
                }
                if let Some(method) = METHOD_MAP.get(name.as_str()) {
                    let receiver = self.json(&receiver)?;
                    let args = self.json_all(&args)?;
                    let result = method.call(&receiver, &args)?;
                    return self.heap.adopt(result);
                }
            }
        }
        Err(Error::NotCallable(describe(callee)))
    }

    // =================================================================
    // Places
    // =================================================================

    fn place(&mut self, target: &Expr) -> Result<Place, Error> {
        match target {
            Expr::Ident(name) => Ok(Place::Binding(name.clone())),
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                let key = self.eval(property)?;
                let key = self.property_key(&key)?;
                Ok(Place::Property(object, key))
            }
            other => Err(Error::Unsupported {
                construct: format!("assignment to {}", describe(other)),
            }),
        }
    }

    fn read_place(&self, place: &Place) -> Result<JsValue, Error> {
        match place {
            Place::Binding(name) => self.lookup(name),
            Place::Property(object, key) => get_property(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: JsValue) -> Result<(), Error> {
        match place {
            Place::Binding(name) => match self.find_mut(&name) {
                Some(binding) if binding.constant => Err(Error::ConstAssignment(name)),
                Some(binding) => {
                    binding.value = value;
                    Ok(())
                }
                // Assigning an undeclared name creates it in the function scope
                None => {
                    self.bind(&name, value);
                    Ok(())
                }
            },
            Place::Property(object, key) => set_property(&mut self.heap, &object, key, value),
        }
    }
}

/// Apply a binary operator to JSON operands.
fn binary(op: &str, left: &Value, right: &Value) -> Result<Value, Error> {
    let number = |result: Result<f64, Error>| result.and_then(|num| js_op::to_number_value(num, op));
    match op {
        "+" => js_op::abstract_plus(left, right),
        "-" => number(js_op::abstract_minus(left, right)),
        "*" => number(js_op::abstract_mul(left, right)),
        "/" => number(js_op::abstract_div(left, right)),
        "%" => number(js_op::abstract_mod(left, right)),
        "**" => builtins::power(left, right),
        "==" => Ok(Value::Bool(js_op::abstract_eq(left, right))),
        "!=" => Ok(Value::Bool(js_op::abstract_ne(left, right))),
        "===" => Ok(Value::Bool(js_op::strict_eq(left, right))),
        "!==" => Ok(Value::Bool(js_op::strict_ne(left, right))),
        "<" => Ok(Value::Bool(js_op::abstract_lt(left, right))),
        ">" => Ok(Value::Bool(js_op::abstract_gt(left, right))),
        "<=" => Ok(Value::Bool(js_op::abstract_lte(left, right))),
        ">=" => Ok(Value::Bool(js_op::abstract_gte(left, right))),
        _ => Err(Error::UnexpectedError(format!("Unknown operator '{}'", op))),
    }
}
