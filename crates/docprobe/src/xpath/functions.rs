//! XPath 1.0 core function library

use crate::error::Result;
use crate::xpath::ast::Expr;
use crate::xpath::eval::{count_to_number, Evaluator, Frame};
use crate::xpath::value::{Value, XNode};

impl Evaluator<'_> {
    pub(crate) fn call(&self, name: &str, args: &[Expr], frame: Frame) -> Result<Value> {
        match name {
            // node-set
            "last" => {
                self.arity(name, args, 0, 0)?;
                Ok(Value::Number(count_to_number(frame.size)))
            }
            "position" => {
                self.arity(name, args, 0, 0)?;
                Ok(Value::Number(count_to_number(frame.position)))
            }
            "count" => {
                self.arity(name, args, 1, 1)?;
                let nodes = self.node_set_arg(args, 0, frame)?;
                Ok(Value::Number(count_to_number(nodes.len())))
            }
            "local-name" => {
                self.arity(name, args, 0, 1)?;
                let node = self.optional_node(args, frame)?;
                Ok(Value::String(
                    node.map(|n| n.local_name(self.doc)).unwrap_or_default(),
                ))
            }
            "namespace-uri" => {
                self.arity(name, args, 0, 1)?;
                let node = self.optional_node(args, frame)?;
                Ok(Value::String(
                    node.and_then(|n| n.namespace_uri(self.doc))
                        .unwrap_or_default()
                        .to_string(),
                ))
            }
            "name" => {
                self.arity(name, args, 0, 1)?;
                let node = self.optional_node(args, frame)?;
                Ok(Value::String(
                    node.map(|n| n.name(self.doc)).unwrap_or_default(),
                ))
            }

            // string
            "string" => {
                self.arity(name, args, 0, 1)?;
                self.string_or_context(args, frame).map(Value::String)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(self.error("concat() takes at least 2 arguments"));
                }
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&self.string_arg(args, index, frame)?);
                }
                Ok(Value::String(out))
            }
            "starts-with" => {
                self.arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, frame)?;
                let needle = self.string_arg(args, 1, frame)?;
                Ok(Value::Boolean(haystack.starts_with(&needle)))
            }
            "contains" => {
                self.arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, frame)?;
                let needle = self.string_arg(args, 1, frame)?;
                Ok(Value::Boolean(haystack.contains(&needle)))
            }
            "substring-before" => {
                self.arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, frame)?;
                let needle = self.string_arg(args, 1, frame)?;
                Ok(Value::String(
                    haystack
                        .split_once(&needle)
                        .map(|(before, _)| before.to_string())
                        .unwrap_or_default(),
                ))
            }
            "substring-after" => {
                self.arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, frame)?;
                let needle = self.string_arg(args, 1, frame)?;
                Ok(Value::String(
                    haystack
                        .split_once(&needle)
                        .map(|(_, after)| after.to_string())
                        .unwrap_or_default(),
                ))
            }
            "substring" => {
                self.arity(name, args, 2, 3)?;
                let text = self.string_arg(args, 0, frame)?;
                let start = round(self.number_arg(args, 1, frame)?);
                let end = match args.get(2) {
                    Some(_) => start + round(self.number_arg(args, 2, frame)?),
                    None => f64::INFINITY,
                };
                let mut position = 0.0;
                let out = text
                    .chars()
                    .filter(|_| {
                        position += 1.0;
                        position >= start && position < end
                    })
                    .collect();
                Ok(Value::String(out))
            }
            "string-length" => {
                self.arity(name, args, 0, 1)?;
                let text = self.string_or_context(args, frame)?;
                Ok(Value::Number(count_to_number(text.chars().count())))
            }
            "normalize-space" => {
                self.arity(name, args, 0, 1)?;
                let text = self.string_or_context(args, frame)?;
                Ok(Value::String(
                    text.split_whitespace().collect::<Vec<_>>().join(" "),
                ))
            }
            "translate" => {
                self.arity(name, args, 3, 3)?;
                let text = self.string_arg(args, 0, frame)?;
                let from: Vec<char> = self.string_arg(args, 1, frame)?.chars().collect();
                let to: Vec<char> = self.string_arg(args, 2, frame)?.chars().collect();
                let out = text
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(index) => to.get(index).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(Value::String(out))
            }

            // boolean
            "boolean" => {
                self.arity(name, args, 1, 1)?;
                Ok(Value::Boolean(self.arg(args, 0, frame)?.to_boolean()))
            }
            "not" => {
                self.arity(name, args, 1, 1)?;
                Ok(Value::Boolean(!self.arg(args, 0, frame)?.to_boolean()))
            }
            "true" => {
                self.arity(name, args, 0, 0)?;
                Ok(Value::Boolean(true))
            }
            "false" => {
                self.arity(name, args, 0, 0)?;
                Ok(Value::Boolean(false))
            }

            // number
            "number" => {
                self.arity(name, args, 0, 1)?;
                match args.first() {
                    Some(_) => self.number_arg(args, 0, frame).map(Value::Number),
                    None => Ok(Value::Number(
                        Value::NodeSet(vec![frame.node]).to_number(self.doc),
                    )),
                }
            }
            "sum" => {
                self.arity(name, args, 1, 1)?;
                let nodes = self.node_set_arg(args, 0, frame)?;
                let total = nodes
                    .iter()
                    .map(|node| Value::String(node.string_value(self.doc)).to_number(self.doc))
                    .sum();
                Ok(Value::Number(total))
            }
            "floor" => {
                self.arity(name, args, 1, 1)?;
                Ok(Value::Number(self.number_arg(args, 0, frame)?.floor()))
            }
            "ceiling" => {
                self.arity(name, args, 1, 1)?;
                Ok(Value::Number(self.number_arg(args, 0, frame)?.ceil()))
            }
            "round" => {
                self.arity(name, args, 1, 1)?;
                Ok(Value::Number(round(self.number_arg(args, 0, frame)?)))
            }
            _ => Err(self.error(&format!("Unregistered function '{name}'"))),
        }
    }

    fn arity(&self, name: &str, args: &[Expr], min: usize, max: usize) -> Result<()> {
        if (min..=max).contains(&args.len()) {
            return Ok(());
        }
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        Err(self.error(&format!(
            "{name}() takes {expected} arguments, got {}",
            args.len()
        )))
    }

    fn arg(&self, args: &[Expr], index: usize, frame: Frame) -> Result<Value> {
        match args.get(index) {
            Some(expr) => self.eval(expr, frame),
            None => Err(self.error("missing function argument")),
        }
    }

    fn string_arg(&self, args: &[Expr], index: usize, frame: Frame) -> Result<String> {
        Ok(self.arg(args, index, frame)?.to_string_value(self.doc))
    }

    fn number_arg(&self, args: &[Expr], index: usize, frame: Frame) -> Result<f64> {
        Ok(self.arg(args, index, frame)?.to_number(self.doc))
    }

    fn node_set_arg(&self, args: &[Expr], index: usize, frame: Frame) -> Result<Vec<XNode>> {
        match args.get(index) {
            Some(expr) => self.eval_node_set(expr, frame),
            None => Err(self.error("missing function argument")),
        }
    }

    /// First node of the argument, or the context node without one
    fn optional_node(&self, args: &[Expr], frame: Frame) -> Result<Option<XNode>> {
        match args.first() {
            Some(_) => Ok(self.node_set_arg(args, 0, frame)?.first().copied()),
            None => Ok(Some(frame.node)),
        }
    }

    fn string_or_context(&self, args: &[Expr], frame: Frame) -> Result<String> {
        match args.first() {
            Some(_) => self.string_arg(args, 0, frame),
            None => Ok(frame.node.string_value(self.doc)),
        }
    }
}

/// XPath rounding: halves go toward positive infinity
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use indexmap::IndexMap;

    use super::*;
    use crate::xml::parser::Parser;
    use crate::xpath::parser::parse;

    fn eval(xpath: &str) -> Result<Value> {
        let doc = Parser::new(br#"<r><a id="x">one</a><a>two</a><n> 4 </n><n>1.5</n></r>"#)
            .parse()?;
        let namespaces = IndexMap::new();
        let variables = HashMap::new();
        let evaluator = Evaluator::new(&doc, xpath, &namespaces, &variables);
        evaluator.eval(&parse(xpath)?, Frame::single(XNode::Node(doc.document_node())))
    }

    fn string(xpath: &str) -> Result<String> {
        match eval(xpath)? {
            Value::String(s) => Ok(s),
            other => Ok(format!("<{}>", other.type_name())),
        }
    }

    #[test]
    fn test_string_functions() -> Result<()> {
        assert_eq!(string("concat('a', //a[2], 1)")?, "atwo1");
        assert_eq!(string("substring('12345', 2, 3)")?, "234");
        assert_eq!(string("substring('12345', 1.5, 2.6)")?, "234");
        assert_eq!(string("substring('12345', 0 div 0, 3)")?, "");
        assert_eq!(string("substring('12345', -1)")?, "12345");
        assert_eq!(string("substring-before('1999/04/01', '/')")?, "1999");
        assert_eq!(string("substring-after('1999/04/01', '/')")?, "04/01");
        assert_eq!(string("normalize-space('  a   b ')")?, "a b");
        assert_eq!(string("translate('--aaa--', 'abc-', 'ABC')")?, "AAA");
        assert_eq!(string("string(//n[2] * 2)")?, "3");
        Ok(())
    }

    #[test]
    fn test_node_functions() -> Result<()> {
        assert_eq!(string("name(//a[1]/@id)")?, "id");
        assert_eq!(string("local-name(/r/*[last()])")?, "n");
        assert_eq!(string("namespace-uri(/r)")?, "");
        assert_eq!(eval("count(//a)")?, Value::Number(2.0));
        assert_eq!(eval("//a[position() = 2] = 'two'")?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn test_number_functions() -> Result<()> {
        assert_eq!(eval("sum(//n)")?, Value::Number(5.5));
        assert_eq!(eval("number(//n[1])")?, Value::Number(4.0));
        assert_eq!(eval("round(2.5)")?, Value::Number(3.0));
        assert_eq!(eval("round(-2.5)")?, Value::Number(-2.0));
        assert_eq!(eval("floor(-1.5)")?, Value::Number(-2.0));
        assert_eq!(eval("ceiling(1.2)")?, Value::Number(2.0));
        assert_eq!(eval("string-length('héllo')")?, Value::Number(5.0));
        assert_eq!(eval("not(//missing)")?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn test_bad_calls() {
        assert!(eval("unknown()").is_err());
        assert!(eval("count('x')").is_err());
        assert!(eval("true(1)").is_err());
        assert!(eval("concat('a')").is_err());
    }
}
