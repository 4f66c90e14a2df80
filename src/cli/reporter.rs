use colored::Colorize;
use ilc_common::{Diagnostic, DiagnosticCategory};
use ilc_lowering::Visibility;

use crate::cli::driver::{AbiUnitReport, LoweringRun, UnitReport};

pub struct Reporter {
    color: bool,
}

impl Reporter {
    pub fn new(color: bool) -> Self {
        Reporter { color }
    }

    pub fn render(&self, run: &LoweringRun) -> String {
        let mut out = String::new();
        for (index, unit) in run.units.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&self.format_unit(unit));
        }
        let diagnostics: Vec<&Diagnostic> = run.units.iter().flat_map(|u| &u.diagnostics).collect();
        if !diagnostics.is_empty() {
            out.push('\n');
            for diagnostic in &diagnostics {
                out.push_str(&self.format_diagnostic(diagnostic));
                out.push('\n');
            }
            out.push_str(&self.format_summary(diagnostics.len()));
            out.push('\n');
        }
        out
    }

    pub fn format_unit(&self, unit: &UnitReport) -> String {
        let mut out = format!("{} {} ({})\n", self.heading("unit"), unit.package, unit.file);

        for abi in &unit.abi_units {
            out.push_str(&self.format_abi_unit(abi));
        }

        if !unit.symbols.is_empty() {
            out.push_str(&format!("  {}\n", self.heading("symbols")));
            for entry in &unit.symbols {
                let symbol = match &entry.symbol {
                    Some(symbol) if entry.mangled => self.paint_mangled(symbol),
                    Some(symbol) => symbol.clone(),
                    None => self.paint_error("<not lowered>"),
                };
                out.push_str(&format!("    {} -> {}\n", entry.declaration, symbol));
            }
        }

        if !unit.conversions.is_empty() {
            out.push_str(&format!("  {}\n", self.heading("conversions")));
            for entry in &unit.conversions {
                out.push_str(&format!("    #{} {:?}: {}", entry.index, entry.kind, entry.decision));
                if let Some(accessor) = &entry.accessor {
                    out.push_str(&format!(" via {accessor}"));
                }
                out.push('\n');
            }
        }
        out
    }

    fn format_abi_unit(&self, abi: &AbiUnitReport) -> String {
        let mut out = format!(
            "  {} {}: {} / nullable {}\n",
            self.heading("wrapper"),
            abi.wrapper,
            abi.representation,
            abi.nullable_representation
        );
        for member in &abi.members {
            let visibility = match member.visibility {
                Visibility::Public => "public",
                Visibility::Private => "private",
            };
            out.push_str(&format!(
                "    {:<40} {:?} {} {:?}",
                member.signature, member.kind, visibility, member.dispatch
            ));
            if let Some(target) = &member.delegates_to {
                out.push_str(&format!(" -> {target}"));
            }
            out.push('\n');
        }
        out
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();
        if diagnostic.file.is_empty() {
            output.push_str("<unknown>");
        } else {
            output.push_str(&diagnostic.file);
        }
        if diagnostic.length > 0 {
            output.push_str(&format!(
                "({}..{})",
                diagnostic.start,
                diagnostic.start + diagnostic.length
            ));
        }

        output.push_str(" - ");
        output.push_str(&self.format_category(diagnostic));
        output.push(' ');
        output.push_str(&self.format_code(diagnostic.code));
        output.push_str(": ");
        output.push_str(&diagnostic.message_text);

        for related in &diagnostic.related_information {
            output.push_str(&format!("\n    {}: {}", related.file, related.message_text));
        }
        output
    }

    fn format_category(&self, diagnostic: &Diagnostic) -> String {
        let label = if diagnostic.is_internal() {
            "internal error"
        } else {
            match diagnostic.category {
                DiagnosticCategory::Error => "error",
                DiagnosticCategory::Warning => "warning",
                DiagnosticCategory::Suggestion => "suggestion",
                DiagnosticCategory::Message => "message",
            }
        };
        if !self.color {
            return label.to_string();
        }
        match diagnostic.category {
            DiagnosticCategory::Error => label.red().to_string(),
            DiagnosticCategory::Warning => label.yellow().to_string(),
            DiagnosticCategory::Suggestion | DiagnosticCategory::Message => label.blue().to_string(),
        }
    }

    fn format_code(&self, code: u32) -> String {
        let code = format!("ILC{code}");
        if self.color {
            code.bright_black().to_string()
        } else {
            code
        }
    }

    fn format_summary(&self, count: usize) -> String {
        let noun = if count == 1 { "error" } else { "errors" };
        let summary = format!("Found {count} {noun}.");
        if self.color {
            summary.red().bold().to_string()
        } else {
            summary
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_mangled(&self, symbol: &str) -> String {
        if self.color {
            symbol.cyan().to_string()
        } else {
            symbol.to_string()
        }
    }

    fn paint_error(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }
}
