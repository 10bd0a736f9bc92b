use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;
use anyhow::{anyhow, bail, Context, Result};
use crate::descriptor::Type;
use crate::method::AbsMethodId;
use crate::outcome::Outcome;
use crate::value::Value;

/// An input to a [`Case`]: a parenthesized, comma separated list of JVM
/// values, e.g. `(6, 0)` or `([I:1, 2], true)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
	pub values: Vec<Value>,
}

impl Input {
	pub fn parse(input: &str) -> Result<Input> {
		let mut scanner = Scanner::new(input);

		scanner.expect('(')?;
		let mut values = Vec::new();

		scanner.skip_spaces();
		if scanner.eat(')') {
			scanner.expect_end()?;
			return Ok(Input { values });
		}

		values.push(scanner.value()?);
		loop {
			scanner.skip_spaces();
			if scanner.eat(',') {
				values.push(scanner.value()?);
			} else {
				break;
			}
		}

		scanner.expect(')')?;
		scanner.expect_end()?;

		Ok(Input { values })
	}

	pub fn write(&self) -> String {
		let items: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
		format!("({})", items.join(", "))
	}
}

impl Display for Input {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.write())
	}
}

/// A ground truth case: an absolute method id, an input, and the expected
/// outcome. One case per line in the suite's case file:
///
/// ```txt,ignore
/// jpamb/cases/Simple.divide:(II)I (6, 0) -> divide by zero
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
	pub method: AbsMethodId,
	pub input: Input,
	pub result: Outcome,
}

impl Case {
	pub fn parse(line: &str) -> Result<Case> {
		let (front, result) = line.rsplit_once(" -> ")
			.ok_or_else(|| anyhow!("case line {line:?} has no ` -> ` separator"))?;
		let (method, input) = front.split_once(' ')
			.ok_or_else(|| anyhow!("case line {line:?} has no input tuple"))?;

		Ok(Case {
			method: AbsMethodId::parse(method)
				.with_context(|| anyhow!("bad method id in case line {line:?}"))?,
			input: Input::parse(input.trim())
				.with_context(|| anyhow!("bad input tuple in case line {line:?}"))?,
			result: Outcome::parse(result.trim())
				.with_context(|| anyhow!("bad outcome in case line {line:?}"))?,
		})
	}
}

impl Display for Case {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {} -> {}", self.method, self.input, self.result)
	}
}

struct Scanner<'a> {
	chars: Peekable<Chars<'a>>,
	input: &'a str,
}

impl<'a> Scanner<'a> {
	fn new(input: &'a str) -> Scanner<'a> {
		Scanner { chars: input.chars().peekable(), input }
	}

	fn skip_spaces(&mut self) {
		while self.chars.next_if(|c| *c == ' ' || *c == '\t').is_some() {}
	}

	fn eat(&mut self, c: char) -> bool {
		self.chars.next_if_eq(&c).is_some()
	}

	fn expect(&mut self, c: char) -> Result<()> {
		self.skip_spaces();
		if !self.eat(c) {
			bail!("expected {c:?} in input {:?}", self.input);
		}
		Ok(())
	}

	fn expect_end(&mut self) -> Result<()> {
		self.skip_spaces();
		if let Some(c) = self.chars.peek() {
			bail!("unexpected trailing {c:?} in input {:?}", self.input);
		}
		Ok(())
	}

	fn value(&mut self) -> Result<Value> {
		self.skip_spaces();
		match self.chars.peek() {
			Some('-' | '0'..='9') => self.int().map(Value::Int),
			Some('\'') => self.char_literal().map(Value::Char),
			Some('[') => self.array(),
			Some(c) if c.is_ascii_alphabetic() => {
				let word = self.word();
				match word.as_str() {
					"true" => Ok(Value::Boolean(true)),
					"false" => Ok(Value::Boolean(false)),
					"null" => Ok(Value::NULL),
					x => bail!("unknown keyword {x:?} in input {:?}", self.input),
				}
			},
			Some(c) => bail!("unexpected {c:?} in input {:?}", self.input),
			None => bail!("unexpected end of input {:?}", self.input),
		}
	}

	fn int(&mut self) -> Result<i32> {
		let mut text = String::new();
		if self.eat('-') {
			text.push('-');
		}
		while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit()) {
			text.push(c);
		}
		text.parse()
			.with_context(|| anyhow!("bad integer literal {text:?} in input {:?}", self.input))
	}

	fn char_literal(&mut self) -> Result<char> {
		self.expect('\'')?;
		let c = self.chars.next()
			.ok_or_else(|| anyhow!("unterminated character literal in input {:?}", self.input))?;
		self.expect('\'')?;
		Ok(c)
	}

	fn array(&mut self) -> Result<Value> {
		self.expect('[')?;
		let tag = self.chars.next()
			.ok_or_else(|| anyhow!("unterminated array literal in input {:?}", self.input))?;
		self.expect(':')?;

		let elem = match tag {
			'I' => Type::Int,
			'C' => Type::Char,
			x => bail!("unknown array tag {x:?} in input {:?}", self.input),
		};

		let mut items = Vec::new();
		self.skip_spaces();
		if self.eat(']') {
			return Ok(Value::Array(elem, items));
		}

		loop {
			self.skip_spaces();
			let item = match elem {
				Type::Char => Value::Char(self.char_literal()?),
				_ => Value::Int(self.int()?),
			};
			items.push(item);

			self.skip_spaces();
			if self.eat(',') {
				continue;
			}
			self.expect(']')?;
			break;
		}

		Ok(Value::Array(elem, items))
	}

	fn word(&mut self) -> String {
		let mut s = String::new();
		while let Some(c) = self.chars.next_if(|c| c.is_ascii_alphabetic()) {
			s.push(c);
		}
		s
	}
}
