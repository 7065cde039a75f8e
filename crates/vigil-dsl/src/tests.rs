use crate::ast::{Expr, Stmt};
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::token::TokenKind;

fn lex_kinds(input: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(input);
    let mut kinds = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        kinds.push(token.kind);
        if done {
            break;
        }
    }
    kinds
}

#[test]
fn lexer_tokenizes_a_full_rule() {
    let input = r#"when heap.alloc > 200MB { alert("Memory usage high") }"#;
    let expected = vec![
        TokenKind::When,
        TokenKind::Ident,
        TokenKind::Dot,
        TokenKind::Ident,
        TokenKind::Gt,
        TokenKind::Int,
        TokenKind::Megabytes,
        TokenKind::LBrace,
        TokenKind::Ident,
        TokenKind::LParen,
        TokenKind::Str,
        TokenKind::RParen,
        TokenKind::RBrace,
        TokenKind::Eof,
    ];
    assert_eq!(lex_kinds(input), expected);
}

#[test]
fn lexer_recognizes_two_char_operators() {
    let kinds = lex_kinds("== != <= >= && || = ! < >");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Eq,
            TokenKind::NotEq,
            TokenKind::Lte,
            TokenKind::Gte,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Assign,
            TokenKind::Not,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn lexer_rejects_lone_ampersand_and_pipe() {
    assert_eq!(lex_kinds("&"), vec![TokenKind::Illegal, TokenKind::Eof]);
    assert_eq!(lex_kinds("|"), vec![TokenKind::Illegal, TokenKind::Eof]);
}

#[test]
fn lexer_scans_numbers() {
    let mut lexer = Lexer::new("42 3.25 7.");
    let t = lexer.next_token();
    assert_eq!((t.kind, t.literal.as_str()), (TokenKind::Int, "42"));
    let t = lexer.next_token();
    assert_eq!((t.kind, t.literal.as_str()), (TokenKind::Float, "3.25"));
    // A trailing dot with no digit is not part of the number.
    let t = lexer.next_token();
    assert_eq!((t.kind, t.literal.as_str()), (TokenKind::Int, "7"));
    assert_eq!(lexer.next_token().kind, TokenKind::Dot);
}

#[test]
fn lexer_string_excludes_delimiters_and_tolerates_eof() {
    let mut lexer = Lexer::new(r#""hello world""#);
    let t = lexer.next_token();
    assert_eq!((t.kind, t.literal.as_str()), (TokenKind::Str, "hello world"));

    // Unterminated string ends at EOF.
    let mut lexer = Lexer::new(r#""dangling"#);
    let t = lexer.next_token();
    assert_eq!((t.kind, t.literal.as_str()), (TokenKind::Str, "dangling"));
}

#[test]
fn lexer_tracks_line_and_column() {
    let mut lexer = Lexer::new("when\n  x");
    let when = lexer.next_token();
    assert_eq!((when.line, when.column), (1, 1));
    let x = lexer.next_token();
    assert_eq!((x.line, x.column), (2, 3));
}

#[test]
fn parser_builds_when_statement() {
    let program = parse(r#"when heap.alloc > 100 { log("hit") }"#).unwrap();
    assert_eq!(program.statements.len(), 1);
    match &program.statements[0] {
        Stmt::When { condition, body } => {
            assert_eq!(condition.to_string(), "(heap.alloc > 100)");
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected when statement, got {other:?}"),
    }
}

#[test]
fn parser_precedence_groups_logical_below_comparison() {
    let program = parse("a.b > 1 && c.d < 2").unwrap();
    assert_eq!(program.to_string(), "((a.b > 1) && (c.d < 2))");
}

#[test]
fn parser_precedence_arithmetic() {
    let program = parse("1 + 2 * 3 > 4").unwrap();
    assert_eq!(program.to_string(), "((1 + (2 * 3)) > 4)");
}

#[test]
fn parser_grouped_expression_overrides_precedence() {
    let program = parse("(1 + 2) * 3").unwrap();
    assert_eq!(program.to_string(), "((1 + 2) * 3)");
}

#[test]
fn parser_attaches_unit_suffixes() {
    let program = parse("200MB").unwrap();
    match &program.statements[0] {
        Stmt::Expr(Expr::Unit { value, unit }) => {
            assert_eq!(**value, Expr::IntegerLiteral(200));
            assert_eq!(unit, "MB");
        }
        other => panic!("expected unit expression, got {other:?}"),
    }

    let program = parse("1.5s").unwrap();
    match &program.statements[0] {
        Stmt::Expr(Expr::Unit { value, unit }) => {
            assert_eq!(**value, Expr::FloatLiteral(1.5));
            assert_eq!(unit, "s");
        }
        other => panic!("expected unit expression, got {other:?}"),
    }
}

#[test]
fn parser_call_with_arguments() {
    let program = parse(r#"avg("heap.alloc", 5m) > 100"#).unwrap();
    assert_eq!(program.to_string(), "(avg(heap.alloc, 5m) > 100)");
}

#[test]
fn parser_collects_errors_instead_of_aborting() {
    let err = parse("when > { }").unwrap_err();
    assert!(!err.is_empty());

    let err = parse("when x > 1 alert()").unwrap_err();
    assert!(err.iter().any(|e| e.contains("expected next token")));
}

#[test]
fn parser_reports_illegal_tokens() {
    let err = parse("a # b").unwrap_err();
    assert!(err.iter().any(|e| e.contains("ILLEGAL")));
}

#[test]
fn count_nodes_covers_the_whole_tree() {
    // program(1) + when(2: statement + block) + infix(1) + dot(1+2) + int(1)
    // + call(1) + ident(1) + string(1)
    let program = parse(r#"when heap.alloc > 100 { log("x") }"#).unwrap();
    assert_eq!(program.count_nodes(), 11);

    let simple = parse("1").unwrap();
    assert_eq!(simple.count_nodes(), 2);
}

#[test]
fn count_nodes_grows_with_condition_complexity() {
    let small = parse(r#"when a.b > 1 { log("x") }"#).unwrap();
    let large = parse(r#"when a.b > 1 && c.d > 2 && e.f > 3 { log("x") }"#).unwrap();
    assert!(large.count_nodes() > small.count_nodes());
}

#[test]
fn multiple_rules_in_one_program() {
    let program = parse(
        r#"
        when a.b > 1 { log("one") }
        when c.d > 2 { log("two") }
        "#,
    )
    .unwrap();
    assert_eq!(program.statements.len(), 2);
}
