//! Template evaluation.

use super::funcs;
use super::{Command, Functions, Node, Operand, Pipeline, TemplateError};
use crate::value::Value;

pub(super) fn execute(
    name: &str,
    nodes: &[Node],
    data: &Value,
    functions: &dyn Functions,
) -> Result<String, TemplateError> {
    let mut state = State {
        name,
        functions,
        vars: vec![("$".to_string(), data.clone())],
        out: String::new(),
    };
    state.walk(data, nodes)?;
    Ok(state.out)
}

struct State<'a> {
    name: &'a str,
    functions: &'a dyn Functions,
    vars: Vec<(String, Value)>,
    out: String,
}

impl State<'_> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Exec {
            name: self.name.to_string(),
            message: message.into(),
        }
    }

    fn walk(&mut self, dot: &Value, nodes: &[Node]) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Output(pipeline) => {
                    let value = self.pipeline(dot, pipeline)?;
                    if pipeline.decl.is_empty() {
                        self.out.push_str(&value.to_string());
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let mut taken = false;
                    for (condition, body) in branches {
                        if self.pipeline(dot, condition)?.is_truthy() {
                            self.walk(dot, body)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(dot, otherwise)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => self.range(dot, pipeline, body, otherwise)?,
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self.pipeline(dot, pipeline)?;
                    if value.is_truthy() {
                        self.walk(&value, body)?;
                    } else {
                        self.walk(dot, otherwise)?;
                    }
                    self.vars.truncate(mark);
                }
            }
        }
        Ok(())
    }

    fn range(
        &mut self,
        dot: &Value,
        pipeline: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
    ) -> Result<(), TemplateError> {
        let collection = self.commands(dot, &pipeline.commands)?;
        let items = collection.items().map_err(|m| self.error(m))?;
        if items.is_empty() {
            return self.walk(dot, otherwise);
        }
        for (key, item) in items {
            let mark = self.vars.len();
            match pipeline.decl.as_slice() {
                [] => {}
                [v] => self.vars.push((v.clone(), item.clone())),
                [k, v] => {
                    self.vars.push((k.clone(), key));
                    self.vars.push((v.clone(), item.clone()));
                }
                _ => return Err(self.error("too many declarations in range")),
            }
            self.walk(&item, body)?;
            self.vars.truncate(mark);
        }
        Ok(())
    }

    /// Evaluate a pipeline, binding its declared variable if any.
    fn pipeline(&mut self, dot: &Value, pipeline: &Pipeline) -> Result<Value, TemplateError> {
        let value = self.commands(dot, &pipeline.commands)?;
        for name in &pipeline.decl {
            self.vars.push((name.clone(), value.clone()));
        }
        Ok(value)
    }

    fn commands(&mut self, dot: &Value, commands: &[Command]) -> Result<Value, TemplateError> {
        let mut last: Option<Value> = None;
        for command in commands {
            last = Some(self.command(dot, command, last.take())?);
        }
        Ok(last.unwrap_or(Value::Null))
    }

    fn command(
        &mut self,
        dot: &Value,
        command: &Command,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        match command.args.split_first() {
            Some((Operand::Func(name), rest)) => {
                let mut args = rest
                    .iter()
                    .map(|op| self.operand(dot, op))
                    .collect::<Result<Vec<_>, _>>()?;
                args.extend(piped);
                self.call(name, &args)
            }
            Some((first, [])) => {
                if piped.is_some() {
                    return Err(self.error("can't give argument to non-function"));
                }
                self.operand(dot, first)
            }
            Some(_) => Err(self.error("can't give argument to non-function")),
            None => Err(self.error("empty command")),
        }
    }

    fn operand(&mut self, dot: &Value, operand: &Operand) -> Result<Value, TemplateError> {
        match operand {
            Operand::Field(path) => self.path(dot, path),
            Operand::Variable(name, path) => {
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| self.error(format!("undefined variable: {}", name)))?;
                self.path(&value, path)
            }
            Operand::Func(name) => self.call(name, &[]),
            Operand::Str(s) => Ok(Value::String(s.clone())),
            Operand::Int(n) => Ok(Value::Integer(*n)),
            Operand::Float(f) => Ok(Value::Float(*f)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Nil => Ok(Value::Null),
            Operand::Sub(pipeline, path) => {
                let value = self.commands(dot, &pipeline.commands)?;
                self.path(&value, path)
            }
        }
    }

    fn path(&self, start: &Value, path: &[String]) -> Result<Value, TemplateError> {
        let mut current = start.clone();
        for segment in path {
            current = current.field(segment).map_err(|m| self.error(m))?;
        }
        Ok(current)
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
        let result = match self.functions.call(name, args) {
            Some(result) => result,
            None => funcs::builtin(name, args)
                .ok_or_else(|| self.error(format!("function \"{}\" not defined", name)))?,
        };
        result.map_err(|e| match e {
            TemplateError::Func(message) => {
                self.error(format!("error calling {}: {}", name, message))
            }
            other => other,
        })
    }
}
