//! Parser implementation using chumsky
//!
//! The grammar produces a flat list of intermediate items; `assemble_module`
//! then lowers them into the [`Module`] structure, hoisting `extends` into
//! the parent expression and moving `embed` bodies into the enclosing
//! module's embedded-template list.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Intermediate parse item, lowered into [`Module`] by `assemble_module`
#[derive(Debug, Clone)]
enum Item {
    Text(String),
    Print(Expr),
    Extends(Expr, Span),
    Include {
        expr: Expr,
        variables: Option<Expr>,
        only: bool,
        ignore_missing: bool,
    },
    Import {
        expr: Expr,
        alias: String,
    },
    Set {
        name: String,
        value: Expr,
    },
    Block {
        name: String,
        body: Vec<Item>,
    },
    If {
        arms: Vec<(Expr, Vec<Item>)>,
        else_body: Vec<Item>,
    },
    Embed {
        target: Expr,
        variables: Option<Expr>,
        only: bool,
        body: Vec<Item>,
    },
}

/// Postfix operator applied to a primary expression
#[derive(Debug, Clone)]
enum PostfixOp {
    Attr(String),
    Filter(String, Vec<Expr>),
}

/// Parse template source into a module AST
pub fn parse(input: &str) -> Result<Module, Vec<ParseError>> {
    let tokens = crate::parser::lexer::lex(input).map_err(|e| vec![e])?;
    let len = input.len();

    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    let items = template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect::<Vec<_>>())?;

    assemble_module(items).map_err(|e| vec![e])
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Vec<Item>, extra::Err<Rich<'a, Token>>>
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Expression parser, precedence low-to-high: ternary, equality,
    // concatenation, `not`, postfix (attribute/filter), primary
    let expr = recursive(|expr| {
        let ident = select! {
            Token::Ident(s) => s,
        };

        let constant = select! {
            Token::String(s) => Expr::constant(Value::Str(s)),
            Token::Number(n) => Expr::constant(Value::Number(n)),
            Token::True => Expr::constant(Value::Bool(true)),
            Token::False => Expr::constant(Value::Bool(false)),
            Token::Null => Expr::constant(Value::Null),
        };

        let arg_list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        // `include(...)` is valid in call position even though `include`
        // lexes as a tag keyword
        let callee = choice((
            ident.clone(),
            just(Token::Include).to(String::from("include")),
        ));

        let call_or_name = callee.then(arg_list.clone().or_not()).map(|(name, args)| {
            match args {
                Some(args) => Expr::FunctionCall { name, args },
                None => Expr::Name { name },
            }
        });

        // Array literals are auto-keyed 0..n into the interleaved layout
        let array = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(|values| {
                let mut items = Vec::with_capacity(values.len() * 2);
                for (i, value) in values.into_iter().enumerate() {
                    items.push(Expr::constant(Value::Number(i as f64)));
                    items.push(value);
                }
                Expr::Array { items }
            });

        // Hash literals keep their keys in the even slots
        let hash_key = choice((
            select! {
                Token::String(s) => Expr::constant(Value::Str(s)),
                Token::Number(n) => Expr::constant(Value::Number(n)),
            },
            ident.clone().map(|name| Expr::constant(Value::Str(name))),
        ));

        let hash = hash_key
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(|pairs| {
                let mut items = Vec::with_capacity(pairs.len() * 2);
                for (key, value) in pairs {
                    items.push(key);
                    items.push(value);
                }
                Expr::Array { items }
            });

        let paren = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let primary = choice((constant, array, hash, paren, call_or_name));

        let postfix_op = choice((
            just(Token::Dot).ignore_then(ident.clone()).map(PostfixOp::Attr),
            just(Token::Pipe)
                .ignore_then(ident.clone())
                .then(arg_list.clone().or_not())
                .map(|(name, args)| PostfixOp::Filter(name, args.unwrap_or_default())),
        ));

        let postfix = primary
            .then(postfix_op.repeated().collect::<Vec<_>>())
            .map(|(base, ops)| {
                ops.into_iter().fold(base, |inner, op| match op {
                    PostfixOp::Attr(name) => Expr::GetAttr {
                        expr: Box::new(inner),
                        name,
                    },
                    PostfixOp::Filter(name, args) => Expr::Filter {
                        expr: Box::new(inner),
                        name,
                        args,
                    },
                })
            });

        let unary = just(Token::Not)
            .or_not()
            .then(postfix)
            .map(|(not, inner)| match not {
                Some(_) => Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(inner),
                },
                None => inner,
            });

        let concat = unary
            .clone()
            .then(
                just(Token::Tilde)
                    .ignore_then(unary)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| {
                rest.into_iter().fold(first, |left, right| Expr::Concat {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            });

        let equality = concat
            .clone()
            .then(
                choice((
                    just(Token::Eq).to(BinaryOp::Eq),
                    just(Token::NotEq).to(BinaryOp::NotEq),
                ))
                .then(concat)
                .or_not(),
            )
            .map(|(left, tail)| match tail {
                Some((op, right)) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                None => left,
            });

        // Ternary is lowest; `a ?: b` reuses the condition as the true branch
        equality
            .then(
                choice((
                    just(Token::Question)
                        .ignore_then(expr.clone())
                        .then_ignore(just(Token::Colon))
                        .then(expr.clone())
                        .map(|(then, otherwise)| (Some(then), otherwise)),
                    just(Token::QuestionColon)
                        .ignore_then(expr.clone())
                        .map(|otherwise| (None, otherwise)),
                ))
                .or_not(),
            )
            .map(|(cond, tail)| match tail {
                Some((then, otherwise)) => {
                    let then = then.unwrap_or_else(|| cond.clone());
                    Expr::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    }
                }
                None => cond,
            })
            .boxed()
    });

    let ident = select! {
        Token::Ident(s) => s,
    };

    // Recursive item parser; block constructs parse their bodies with the
    // same parser, stopping at their end tags (which match no alternative)
    let item = recursive(|item| {
        let body = item.clone().repeated().collect::<Vec<Item>>();

        let text = select! {
            Token::Text(t) => Item::Text(t),
        };

        let print = expr
            .clone()
            .delimited_by(just(Token::OutputOpen), just(Token::OutputClose))
            .map(Item::Print);

        let extends_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Extends))
            .ignore_then(expr.clone())
            .then_ignore(just(Token::TagClose))
            .map_with(|e, ex| Item::Extends(e, span_range(&ex.span())));

        let include_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Include))
            .ignore_then(expr.clone())
            .then(just(Token::Ignore).then(just(Token::Missing)).or_not())
            .then(just(Token::With).ignore_then(expr.clone()).or_not())
            .then(just(Token::Only).or_not())
            .then_ignore(just(Token::TagClose))
            .map(|(((expr, ignore_missing), variables), only)| Item::Include {
                expr,
                variables,
                only: only.is_some(),
                ignore_missing: ignore_missing.is_some(),
            });

        let import_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Import))
            .ignore_then(expr.clone())
            .then_ignore(just(Token::As))
            .then(ident.clone())
            .then_ignore(just(Token::TagClose))
            .map(|(expr, alias)| Item::Import { expr, alias });

        let set_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Set))
            .ignore_then(ident.clone())
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .then_ignore(just(Token::TagClose))
            .map(|(name, value)| Item::Set { name, value });

        let block_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Block))
            .ignore_then(ident.clone())
            .then_ignore(just(Token::TagClose))
            .then(body.clone())
            .then_ignore(
                just(Token::TagOpen)
                    .then(just(Token::EndBlock))
                    .then(ident.clone().or_not())
                    .then(just(Token::TagClose)),
            )
            .map(|(name, body)| Item::Block { name, body });

        let elseif_arm = just(Token::TagOpen)
            .ignore_then(just(Token::ElseIf))
            .ignore_then(expr.clone())
            .then_ignore(just(Token::TagClose))
            .then(body.clone());

        let else_arm = just(Token::TagOpen)
            .then(just(Token::Else))
            .then(just(Token::TagClose))
            .ignore_then(body.clone());

        let if_tag = just(Token::TagOpen)
            .ignore_then(just(Token::If))
            .ignore_then(expr.clone())
            .then_ignore(just(Token::TagClose))
            .then(body.clone())
            .then(elseif_arm.repeated().collect::<Vec<_>>())
            .then(else_arm.or_not())
            .then_ignore(
                just(Token::TagOpen)
                    .then(just(Token::EndIf))
                    .then(just(Token::TagClose)),
            )
            .map(|(((cond, body), elseifs), else_body)| {
                let mut arms = vec![(cond, body)];
                arms.extend(elseifs);
                Item::If {
                    arms,
                    else_body: else_body.unwrap_or_default(),
                }
            });

        let embed_tag = just(Token::TagOpen)
            .ignore_then(just(Token::Embed))
            .ignore_then(expr.clone())
            .then(just(Token::With).ignore_then(expr.clone()).or_not())
            .then(just(Token::Only).or_not())
            .then_ignore(just(Token::TagClose))
            .then(body.clone())
            .then_ignore(
                just(Token::TagOpen)
                    .then(just(Token::EndEmbed))
                    .then(just(Token::TagClose)),
            )
            .map(|(((target, variables), only), body)| Item::Embed {
                target,
                variables,
                only: only.is_some(),
                body,
            });

        choice((
            text,
            print,
            extends_tag,
            include_tag,
            import_tag,
            set_tag,
            block_tag,
            if_tag,
            embed_tag,
        ))
        .boxed()
    });

    item.repeated().collect::<Vec<_>>().then_ignore(end())
}

/// Lower the parsed item list into a module
fn assemble_module(items: Vec<Item>) -> Result<Module, ParseError> {
    let mut module = Module::new();
    let body = lower_items(items, &mut module)?;
    module.body = body;
    Ok(module)
}

/// Lower items into nodes, attaching embeds and `extends` to `module`
fn lower_items(items: Vec<Item>, module: &mut Module) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    for item in items {
        match item {
            Item::Text(content) => nodes.push(Node::Text { content }),
            Item::Print(expr) => nodes.push(Node::Print { expr }),
            Item::Extends(expr, span) => {
                if module.parent.is_some() {
                    return Err(ParseError::Syntax {
                        span,
                        message: "A template may only extend one other template".to_string(),
                        expected: vec![],
                    });
                }
                module.parent = Some(expr);
            }
            Item::Include {
                expr,
                variables,
                only,
                ignore_missing,
            } => nodes.push(Node::Include {
                expr,
                variables,
                only,
                ignore_missing,
            }),
            Item::Import { expr, alias } => nodes.push(Node::Import { expr, alias }),
            Item::Set { name, value } => nodes.push(Node::Set { name, value }),
            Item::Block { name, body } => {
                let body = lower_items(body, module)?;
                nodes.push(Node::Block { name, body });
            }
            Item::If { arms, else_body } => {
                let mut lowered = Vec::with_capacity(arms.len());
                for (cond, body) in arms {
                    let body = lower_items(body, module)?;
                    lowered.push(IfArm { cond, body });
                }
                let else_body = lower_items(else_body, module)?;
                nodes.push(Node::If {
                    arms: lowered,
                    else_body,
                });
            }
            Item::Embed {
                target,
                variables,
                only,
                body,
            } => {
                let mut embedded = Module::new();
                embedded.parent = Some(target);
                let lowered = lower_items(body, &mut embedded)?;
                embedded.body = lowered;
                let index = module.embedded.len();
                module.embedded.push(embedded);
                nodes.push(Node::Embed {
                    index,
                    variables,
                    only,
                });
            }
        }
    }
    Ok(nodes)
}
