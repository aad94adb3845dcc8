//! Unit tests for the generator catalogue

use mysql_obfuscator::faker::{Generator, GeneratorKind, RuleError};
use serde_yaml_ng::Value;

fn generator(yaml: &str) -> Generator {
    let rule: Value = serde_yaml_ng::from_str(yaml).unwrap();
    Generator::from_rule(&rule).unwrap()
}

#[test]
fn test_every_parameterless_kind_produces_text() {
    for kind in GeneratorKind::ALL {
        if matches!(kind, GeneratorKind::Fixed | GeneratorKind::String) {
            continue;
        }
        let g = Generator::construct(kind, &Value::Null).unwrap();
        assert_eq!(g.kind(), kind);
        assert!(!g.next_value().is_empty(), "{} produced an empty value", kind);
    }
}

#[test]
fn test_zip_code_is_five_or_nine_digits() {
    let g = generator("{ type: zip_code }");
    for _ in 0..2000 {
        let zip = g.next_value();
        let digits: String = zip.chars().filter(|c| c.is_ascii_digit()).collect();
        assert!(
            digits.len() == 5 || digits.len() == 9,
            "unexpected zip code: {}",
            zip
        );
    }
}

#[test]
fn test_ipv4_is_dotted_quad() {
    let g = generator("{ type: ipv4 }");
    for _ in 0..200 {
        let ip = g.next_value();
        assert!(ip.parse::<std::net::Ipv4Addr>().is_ok(), "not IPv4: {}", ip);
    }
}

#[test]
fn test_random_string_has_requested_length() {
    let g = generator("{ type: string, length: 24 }");
    let a = g.next_value();
    let b = g.next_value();
    assert_eq!(a.chars().count(), 24);
    assert_ne!(a, b);
}

#[test]
fn test_emails_vary_between_calls() {
    let g = generator("{ type: email }");
    let values: Vec<String> = (0..20).map(|_| g.next_value()).collect();
    assert!(values.iter().all(|v| v.contains('@')));
    let first = &values[0];
    assert!(values.iter().any(|v| v != first));
}

#[test]
fn test_fixed_ignores_row_count() {
    let g = generator("{ type: fixed, string: 'n/a' }");
    assert!((0..50).all(|_| g.next_value() == "n/a"));
}

#[test]
fn test_unknown_kind_error_message() {
    let rule: Value = serde_yaml_ng::from_str("{ type: credit_card }").unwrap();
    let err = Generator::from_rule(&rule).unwrap_err();
    assert_eq!(err, RuleError::UnknownKind("credit_card".to_string()));
    assert_eq!(err.to_string(), "unknown generator type 'credit_card'");
}
