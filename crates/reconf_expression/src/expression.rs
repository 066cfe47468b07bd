//! Parsed trigger expressions.

use crate::error::{ExpressionError, ExpressionResult};
use crate::parser::Parser;
use reconf_model::ItemRef;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Parser settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept `{#MACRO}` operands, as used by trigger prototypes.
    pub allow_lld_macros: bool,
}

impl ParseOptions {
    /// Settings for trigger prototype expressions.
    #[must_use]
    pub const fn prototype() -> Self {
        Self {
            allow_lld_macros: true,
        }
    }
}

/// One `{host:key.function(parameters)}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMacro {
    /// Host or template name.
    pub host: String,
    /// Item key, including bracketed parameters.
    pub key: String,
    /// Function name.
    pub function: String,
    /// Unquoted function parameters.
    pub parameters: Vec<String>,
    /// Byte range of the whole macro, braces included.
    pub span: Range<usize>,
    /// Byte range of the host name.
    pub host_span: Range<usize>,
}

impl FunctionMacro {
    /// The referenced item as a host/key pair.
    #[must_use]
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.host.clone(), self.key.clone())
    }
}

/// A syntactically valid trigger expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerExpression {
    text: String,
    macros: Vec<FunctionMacro>,
}

impl TriggerExpression {
    /// Parses a trigger expression.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] describing the first offending part.
    pub fn parse(text: &str) -> ExpressionResult<Self> {
        Self::parse_with(text, ParseOptions::default())
    }

    /// Parses an expression with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] describing the first offending part.
    pub fn parse_with(text: &str, options: ParseOptions) -> ExpressionResult<Self> {
        let macros = Parser::new(text, options).parse()?;
        Ok(Self {
            text: text.to_string(),
            macros,
        })
    }

    /// The source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Function macros in order of appearance.
    #[must_use]
    pub fn function_macros(&self) -> &[FunctionMacro] {
        &self.macros
    }

    /// Referenced items in order of appearance, repeats included.
    #[must_use]
    pub fn host_items(&self) -> Vec<ItemRef> {
        self.macros.iter().map(FunctionMacro::item).collect()
    }

    /// Distinct referenced hosts in order of first appearance.
    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for host in self.macros.iter().map(|m| m.host.as_str()) {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }

    /// Returns true if any function macro points at `host`.
    #[must_use]
    pub fn references_host(&self, host: &str) -> bool {
        self.macros.iter().any(|m| m.host == host)
    }

    /// Returns the expression text with every function macro on `from`
    /// pointing at `to` instead.
    #[must_use]
    pub fn replace_host(&self, from: &str, to: &str) -> String {
        let mut result = String::with_capacity(self.text.len());
        let mut last = 0;
        for m in self.macros.iter().filter(|m| m.host == from) {
            result.push_str(&self.text[last..m.host_span.start]);
            result.push_str(to);
            last = m.host_span.end;
        }
        result.push_str(&self.text[last..]);
        result
    }
}

impl fmt::Display for TriggerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for TriggerExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MAX_DEPTH;
    use proptest::prelude::*;

    fn items(text: &str) -> Vec<(String, String)> {
        TriggerExpression::parse(text)
            .unwrap()
            .host_items()
            .into_iter()
            .map(|i| (i.host, i.key))
            .collect()
    }

    #[test]
    fn simple_comparison() {
        assert_eq!(
            items("{web1:agent.ping.nodata(5m)}=1"),
            vec![("web1".to_string(), "agent.ping".to_string())]
        );
    }

    #[test]
    fn bracketed_key_with_quotes_and_arrays() {
        let expr =
            TriggerExpression::parse(r#"{host:key[a,,"b",,[c,d]].count(1,,"b",3)}=0"#).unwrap();
        let m = &expr.function_macros()[0];
        assert_eq!(m.host, "host");
        assert_eq!(m.key, r#"key[a,,"b",,[c,d]]"#);
        assert_eq!(m.function, "count");
        assert_eq!(m.parameters, vec!["1", "", "b", "3"]);
    }

    #[test]
    fn quoted_parameter_with_escaped_quote() {
        let expr =
            TriggerExpression::parse(r#"{host:log[/var/log/app].str("say \"hi\"")}=1"#).unwrap();
        assert_eq!(expr.function_macros()[0].parameters, vec![r#"say "hi""#]);
    }

    #[test]
    fn dotted_key_without_brackets() {
        assert_eq!(
            items("{Template OS Linux:system.cpu.load.avg(5m)}>5"),
            vec![(
                "Template OS Linux".to_string(),
                "system.cpu.load".to_string()
            )]
        );
    }

    #[test]
    fn several_hosts_in_order() {
        let expr = TriggerExpression::parse(
            "({web1:net.if.in[eth0].last()}+{web2:net.if.in[eth0].last()})/2>100K | {web1:agent.ping.nodata(5m)}=1",
        )
        .unwrap();
        assert_eq!(expr.function_macros().len(), 3);
        assert_eq!(expr.hosts(), vec!["web1", "web2"]);
        assert!(expr.references_host("web2"));
        assert!(!expr.references_host("web3"));
    }

    #[test]
    fn operators_and_keywords() {
        for text in [
            "{h:k.last()}>=1 and {h:k.last()}<=9",
            "not {h:k.last()}<>0 or -{h:k.diff()}=1",
            "{h:k.last()}#0&{h:k.last()}*2/4-1<1.5G",
            "{h:k.last()}={$THRESHOLD}",
            "{h:k.last()}>{$LIMIT:\"eth0\"} & {TRIGGER.VALUE}=0",
            "  (( {h:k.min(#3)} > 0 ))  ",
        ] {
            assert!(TriggerExpression::parse(text).is_ok(), "{text}");
        }
    }

    #[test]
    fn lld_macros_only_for_prototypes() {
        let text = "{h:vfs.fs.size[{#FSNAME},pfree].last()}<{#LIMIT}";
        assert!(matches!(
            TriggerExpression::parse(text),
            Err(ExpressionError::Syntax { .. })
        ));
        let expr = TriggerExpression::parse_with(text, ParseOptions::prototype()).unwrap();
        assert_eq!(expr.function_macros()[0].key, "vfs.fs.size[{#FSNAME},pfree]");
    }

    #[test]
    fn lld_macro_inside_key_is_plain_parameter() {
        assert!(TriggerExpression::parse("{h:vfs.fs.size[{#FSNAME},pfree].last()}<10").is_ok());
    }

    #[test]
    fn rejects_malformed_function_macros() {
        for text in [
            "{host:key}",
            "{host:.diff()}",
            "{:key.diff()}",
            "{host:key.Diff()}",
            "{host:key[a.diff()}",
            "{host:key[a]diff()}",
            "{host:key.diff(}",
            "{host:key.diff()",
            "{host!:key.diff()}",
        ] {
            let err = TriggerExpression::parse(text).unwrap_err();
            assert!(
                matches!(err, ExpressionError::Syntax { position: 0, .. }),
                "{text}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_structure() {
        assert_eq!(TriggerExpression::parse("   "), Err(ExpressionError::Empty));
        assert_eq!(
            TriggerExpression::parse("{h:k.last()}+"),
            Err(ExpressionError::UnexpectedEnd)
        );
        assert_eq!(
            TriggerExpression::parse("1+1"),
            Err(ExpressionError::NoFunctionMacro)
        );
        let err = TriggerExpression::parse("({h:k.last()}=1").unwrap_err();
        assert_eq!(err, ExpressionError::UnexpectedEnd);
        let err = TriggerExpression::parse("{h:k.last()}=1)").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Syntax {
                position: 14,
                fragment: ")".to_string()
            }
        );
        let err = TriggerExpression::parse("{h:k.last()} 1").unwrap_err();
        assert!(err.to_string().contains("starting from \"1\""));
    }

    #[test]
    fn nesting_limit() {
        let deep = format!(
            "{}{{h:k.last()}}{}",
            "(".repeat(MAX_DEPTH + 1),
            ")".repeat(MAX_DEPTH + 1)
        );
        assert_eq!(
            TriggerExpression::parse(&deep),
            Err(ExpressionError::TooDeep { max: MAX_DEPTH })
        );
        let fine = format!("{}{{h:k.last()}}{}", "(".repeat(8), ")".repeat(8));
        assert!(TriggerExpression::parse(&fine).is_ok());
    }

    #[test]
    fn replace_host_only_touches_host_part() {
        let expr = TriggerExpression::parse(
            "{Base Linux:agent.ping.nodata(5m)}=1 and {gw:icmpping.max(3m)}=0 and {Base Linux:proc.num[Base Linux].last()}=0",
        )
        .unwrap();
        assert_eq!(
            expr.replace_host("Base Linux", "web1"),
            "{web1:agent.ping.nodata(5m)}=1 and {gw:icmpping.max(3m)}=0 and {web1:proc.num[Base Linux].last()}=0"
        );
        assert_eq!(expr.replace_host("nobody", "x"), expr.as_str());
    }

    #[test]
    fn from_str_and_display() {
        let expr: TriggerExpression = "{web1:agent.ping.nodata(5m)}=1".parse().unwrap();
        assert_eq!(expr.to_string(), "{web1:agent.ping.nodata(5m)}=1");
    }

    fn host_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9._ -]{0,15}"
    }

    fn item_key() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9_]{0,8}(\\.[a-z0-9_]{1,8}){0,3}", prop::option::of("[a-z0-9,/ ]{0,12}"))
            .prop_map(|(name, params)| match params {
                Some(p) => format!("{name}[{p}]"),
                None => name,
            })
    }

    proptest! {
        #[test]
        fn generated_function_macros_round_trip(
            refs in prop::collection::vec((host_name(), item_key(), "[a-z]{1,8}"), 1..5),
            threshold in 0u32..1000,
        ) {
            let parts: Vec<String> = refs
                .iter()
                .map(|(h, k, f)| format!("{{{h}:{k}.{f}(5m)}}>{threshold}"))
                .collect();
            let text = parts.join(" or ");
            let expr = TriggerExpression::parse(&text).unwrap();
            let found: Vec<(String, String)> = expr
                .host_items()
                .into_iter()
                .map(|i| (i.host, i.key))
                .collect();
            let expected: Vec<(String, String)> =
                refs.iter().map(|(h, k, _)| (h.clone(), k.clone())).collect();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn parser_never_panics(text in "\\PC{0,64}") {
            let _ = TriggerExpression::parse(&text);
        }
    }
}
