//! Parsing of the surface syntax.

use crate::preterm::{Decl, Op, Preterm};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, not, opt, peek, recognize, value, verify},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

type Parse<'a, A> = IResult<&'a str, A>;

const KEYWORDS: &[&str] = &["type", "import", "prod"];

fn lexeme<'a, O>(inner: impl FnMut(&'a str) -> Parse<'a, O>) -> impl FnMut(&'a str) -> Parse<'a, O> {
    preceded(multispace0, inner)
}

fn parens<'a, O>(inner: impl FnMut(&'a str) -> Parse<'a, O>) -> impl FnMut(&'a str) -> Parse<'a, O> {
    delimited(char('('), lexeme(inner), lexeme(char(')')))
}

fn ident(i: &str) -> Parse<&str> {
    verify(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric()),
        )),
        |s: &str| !KEYWORDS.contains(&s),
    )(i)
}

fn level(i: &str) -> Parse<u64> {
    map_res(terminated(digit1, char('l')), |d: &str| d.parse())(i)
}

fn name(i: &str) -> Parse<Preterm> {
    map(separated_list1(char('.'), ident), |path| {
        Preterm::Name(path.into_iter().map(String::from).collect())
    })(i)
}

fn atom(i: &str) -> Parse<Preterm> {
    alt((
        map(level, Preterm::Lvl),
        map(preceded(tag("type"), lexeme(parens(term))), |l| {
            Preterm::Type(Box::new(l))
        }),
        map(preceded(char('?'), opt(ident)), |v| {
            Preterm::Pat(v.map(String::from))
        }),
        value(Preterm::Hole, char('_')),
        name,
        parens(term),
    ))(i)
}

fn appl(i: &str) -> Parse<Preterm> {
    let (i, head) = atom(i)?;
    let args = parens(separated_list1(lexeme(char(',')), lexeme(term)));
    let (i, argss) = many0(lexeme(args))(i)?;
    let tm = argss
        .into_iter()
        .fold(head, |acc, args| Preterm::Appl(Box::new(acc), args));
    Ok((i, tm))
}

fn dep_arrow(i: &str) -> Parse<Preterm> {
    map(
        tuple((
            parens(pair(terminated(ident, lexeme(char(':'))), lexeme(term))),
            lexeme(tag("->")),
            lexeme(term),
        )),
        |((x, a), _, b)| Preterm::Prod(Some(x.to_string()), Box::new(a), Box::new(b)),
    )(i)
}

fn arrow(i: &str) -> Parse<Preterm> {
    alt((
        dep_arrow,
        map(
            pair(appl, opt(preceded(lexeme(tag("->")), lexeme(term)))),
            |(a, b)| match b {
                Some(b) => Preterm::Prod(None, Box::new(a), Box::new(b)),
                None => a,
            },
        ),
    ))(i)
}

fn abst(i: &str) -> Parse<Preterm> {
    map(
        pair(preceded(char('\\'), lexeme(ident)), lexeme(term)),
        |(x, body)| Preterm::Abst(x.to_string(), Box::new(body)),
    )(i)
}

fn term(i: &str) -> Parse<Preterm> {
    alt((abst, arrow))(i)
}

/// `=`, except as the start of the reserved `==`.
fn eq(i: &str) -> Parse<char> {
    terminated(char('='), peek(not(char('='))))(i)
}

fn decl(i: &str) -> Parse<Decl> {
    let (i, lhs) = term(i)?;
    let (i, (op, typ, rhs)) = alt((
        map(preceded(lexeme(tag(":===")), lexeme(term)), |rhs| {
            (Op::Check, None, Some(rhs))
        }),
        map(preceded(lexeme(tag(":=")), lexeme(term)), |rhs| {
            (Op::Rewrite, None, Some(rhs))
        }),
        map(
            pair(
                preceded(lexeme(char(':')), lexeme(term)),
                opt(preceded(lexeme(eq), lexeme(term))),
            ),
            |(typ, rhs)| match rhs {
                Some(rhs) => (Op::Define, Some(typ), Some(rhs)),
                None => (Op::Declare, Some(typ), None),
            },
        ),
        map(preceded(lexeme(eq), lexeme(term)), |rhs| {
            (Op::Define, None, Some(rhs))
        }),
    ))(i)?;
    let line = 0;
    Ok((i, Decl { line, lhs, typ, rhs, op }))
}

/// Parse error with the 1-based source line it was found on.
#[derive(Clone, Debug)]
pub struct Error {
    pub line: usize,
    pub msg: String,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{} (line {})", self.msg, self.line)
    }
}

/// A parsed source file: declarations plus the errors recovered from.
#[derive(Debug, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub errors: Vec<Error>,
}

/// Parse a whole source file.
///
/// A syntax error is recorded and parsing resumes at the next line;
/// declarations are otherwise separated by whitespace and optional `;`.
pub fn program(src: &str) -> Program {
    let mut prog = Program::default();
    let mut rest = src;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if rest.is_empty() {
            break;
        }
        let line = line_of(src, rest);
        match decl(rest) {
            Ok((i, mut d)) => {
                d.line = line;
                prog.decls.push(d);
                rest = i;
            }
            Err(_) => {
                let msg = "syntax error".to_string();
                prog.errors.push(Error { line, msg });
                match rest.find('\n') {
                    Some(idx) => rest = &rest[idx + 1..],
                    None => break,
                }
            }
        }
    }
    prog
}

fn line_of(src: &str, rest: &str) -> usize {
    let consumed = src.len() - rest.len();
    src[..consumed].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term_str(i: &str) -> Preterm {
        let (rest, tm) = term(i).unwrap();
        assert_eq!(rest.trim(), "");
        tm
    }

    #[test]
    fn terms() {
        assert_eq!(
            term_str("Nat.zero"),
            Preterm::Name(vec!["Nat".to_string(), "zero".to_string()])
        );
        assert_eq!(term_str("3l"), Preterm::Lvl(3));
        assert_eq!(term_str("?x"), Preterm::Pat(Some("x".to_string())));
        assert_eq!(term_str("?"), Preterm::Pat(None));
        assert_eq!(term_str("_"), Preterm::Hole);
        assert!(matches!(term_str("type(0l)"), Preterm::Type(_)));
        assert!(matches!(term_str("f(a, b, c)"), Preterm::Appl(_, args) if args.len() == 3));
        assert!(matches!(term_str("\\x \\y x"), Preterm::Abst(..)));
        assert!(matches!(term_str("A -> B -> C"), Preterm::Prod(None, ..)));
        assert!(
            matches!(term_str("(x: A) -> B"), Preterm::Prod(Some(x), ..) if x == "x")
        );
        // a parenthesized term is not a dependent arrow
        assert!(matches!(term_str("(x) -> B"), Preterm::Prod(None, ..)))
    }

    #[test]
    fn declarations() {
        let prog = program("Nat: type(0l)\nNat.zero: Nat; Nat.succ: Nat -> Nat");
        assert!(prog.errors.is_empty());
        assert_eq!(prog.decls.len(), 3);
        assert_eq!(prog.decls[0].op, Op::Declare);
        assert_eq!(prog.decls[2].line, 2);

        let prog = program("Nat.double: Nat -> Nat = f(x)");
        assert_eq!(prog.decls[0].op, Op::Define);
        assert!(prog.decls[0].typ.is_some());

        let prog = program("f(?x) := x\nf(a) :=== b");
        assert!(prog.errors.is_empty());
        assert_eq!(prog.decls[0].op, Op::Rewrite);
        assert_eq!(prog.decls[1].op, Op::Check);
    }

    #[test]
    fn multiline_declaration() {
        let src = "Nat.ind: (n: builtin.Level) -> (C: Nat -> type(n)) -> C(Nat.zero)\n       -> ((x: Nat) -> C(x) -> C(Nat.succ(x))) -> (x: Nat) -> C(x)";
        let prog = program(src);
        assert!(prog.errors.is_empty());
        assert_eq!(prog.decls.len(), 1);
    }

    #[test]
    fn recovery_at_line_boundaries() {
        let prog = program("Nat: type(0l)\n)))\nNat.zero: Nat");
        assert_eq!(prog.decls.len(), 2);
        assert_eq!(prog.errors.len(), 1);
        assert_eq!(prog.errors[0].line, 2);
    }

    #[test]
    fn keywords_are_reserved() {
        assert!(ident("type").is_err());
        assert!(ident("import").is_err());
        assert!(ident("prod").is_err());
        assert!(ident("types").is_ok());
    }
}
