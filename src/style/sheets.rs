use crate::paper::PaperConfig;

/// Preview and print rules for the print layer. The math rules inside the
/// print media block must stay in step with [`MATH_OVERRIDE_BASELINE`].
pub fn print_layer_css(paper: &PaperConfig) -> String {
    let mut css = String::new();
    css.push_str(&container_rules(&paper.paper_width));
    css.push_str(WATERMARK_DEFAULT_RULES);
    css.push_str(&page_rules(&paper.paper_size));
    css.push_str(AVOID_BREAK_RULES);
    css.push_str(PRINT_MEDIA_RULES);
    css
}

fn container_rules(paper_width: &str) -> String {
    format!(
        "
body {{
  margin: 0;
  padding: 0;
  background: white;
}}

.print-container {{
  width: 100%;
  max-width: {paper_width};
  margin: 0 auto;
  background: white;
  box-sizing: border-box;
  position: relative;
}}
"
    )
}

pub fn page_rules(paper_size: &str) -> String {
    format!(
        "
@page {{
  size: {paper_size};
  margin: 0;
}}
"
    )
}

// Structural blocks stay on one page.
const AVOID_BREAK_RULES: &str = "
.question-display,
.section-block,
.answer-section,
.solution-section {
  break-inside: avoid !important;
  page-break-inside: avoid !important;
}
";

const WATERMARK_DEFAULT_RULES: &str = "
.watermark {
  position: fixed;
  top: 50%;
  left: 50%;
  transform: translate(-50%, -50%);
  opacity: 0.1;
  z-index: -1;
  pointer-events: none;
}

.watermark img {
  max-width: 300px;
  max-height: 300px;
}
";

const PRINT_MEDIA_RULES: &str = r#"
@media print {
  body::before,
  body::after {
    display: none !important;
  }

  .print-container {
    padding: 20mm !important;
  }

  .question-display {
    break-inside: avoid !important;
    page-break-inside: avoid !important;
    margin-bottom: 1.5rem !important;
  }

  .section-block {
    break-inside: avoid !important;
    page-break-inside: avoid !important;
  }

  .print-container .answer-section,
  .print-container .solution-section,
  .answer-section,
  .solution-section {
    break-inside: avoid !important;
    page-break-inside: avoid !important;
    background: white !important;
    border: none !important;
    border-left: none !important;
    padding: 0.75rem 0 !important;
    margin-top: 0.75rem !important;
    margin-bottom: 0.5rem !important;
  }

  .print-container .answer-label,
  .print-container .solution-label,
  .answer-label,
  .solution-label {
    font-size: 0.875rem !important;
    font-weight: 700 !important;
    color: black !important;
    margin-bottom: 0.5rem !important;
    display: block !important;
  }

  .print-container .answer-content,
  .print-container .solution-content,
  .answer-content,
  .solution-content {
    font-size: 0.875rem !important;
    color: black !important;
    line-height: 1.6 !important;
    margin-top: 0.25rem !important;
  }

  .print-container .question-text,
  .question-text {
    margin-bottom: 0.5rem !important;
    line-height: 1.6 !important;
    color: black !important;
  }

  .print-container .question-content,
  .question-content {
    line-height: 1.6 !important;
    color: black !important;
  }

  .print-container img,
  img {
    max-width: 100% !important;
    height: auto !important;
    page-break-inside: avoid !important;
    display: block !important;
    margin: 0.5rem 0 !important;
  }

  body,
  .print-container,
  .print-container * {
    -webkit-font-smoothing: antialiased !important;
    -moz-osx-font-smoothing: grayscale !important;
    text-rendering: optimizeLegibility !important;
  }

  .print-container .katex,
  .katex {
    font-size: 1em !important;
    color: black !important;
    font-family: KaTeX_Main, "Times New Roman", serif !important;
    line-height: normal !important;
    text-indent: 0;
    text-rendering: optimizeLegibility !important;
    display: inline-block !important;
    vertical-align: baseline !important;
    font-weight: normal !important;
    font-style: normal !important;
  }

  .print-container .katex:not(.katex-display),
  .katex:not(.katex-display) {
    display: inline-block !important;
    vertical-align: baseline !important;
    margin: 0 0.1em !important;
  }

  .print-container .katex *,
  .katex * {
    color: inherit !important;
    line-height: normal !important;
  }

  .print-container .katex .base,
  .katex .base {
    color: black !important;
    visibility: visible !important;
    opacity: 1 !important;
  }

  .print-container .katex .katex-html,
  .katex .katex-html {
    visibility: visible !important;
    opacity: 1 !important;
  }

  .print-container p,
  .print-container span,
  .print-container div,
  .print-container li {
    color: black !important;
    visibility: visible !important;
    opacity: 1 !important;
  }

  .print-container [style*="display: none"],
  .print-container [style*="visibility: hidden"] {
    display: none !important;
    visibility: hidden !important;
  }

  .print-container .katex-html,
  .katex-html {
    display: inline-block !important;
    overflow: visible !important;
  }

  .print-container .katex-mathml,
  .katex-mathml {
    display: none !important;
  }

  .print-container .katex .mfrac,
  .katex .mfrac {
    padding-top: 0.158em !important;
    padding-bottom: 0.082em !important;
    position: relative !important;
    display: inline-block !important;
    vertical-align: middle !important;
  }

  .print-container .katex .mfrac:has(.sqrt),
  .katex .mfrac:has(.sqrt) {
    padding-top: 0.25em !important;
  }

  .print-container .katex .mfrac > .frac-line,
  .print-container .katex .frac-line,
  .katex .mfrac > .frac-line,
  .katex .frac-line {
    border-bottom-width: 0.04em !important;
    min-height: 0.04em !important;
    margin-top: 0.188em !important;
    margin-bottom: 0.092em !important;
    border-bottom-color: black !important;
    border-bottom-style: solid !important;
    display: inline-block !important;
    width: 100% !important;
    position: relative !important;
    background: transparent !important;
  }

  .print-container .katex .mfrac:has(.sqrt) > .frac-line,
  .katex .mfrac:has(.sqrt) > .frac-line {
    margin-top: 0.25em !important;
  }

  .print-container .katex .sqrt,
  .katex .sqrt {
    display: inline-block !important;
    position: relative !important;
    overflow: visible !important;
  }

  .print-container .katex .sqrt svg,
  .katex .sqrt svg {
    display: inline-block !important;
    vertical-align: baseline !important;
    overflow: visible !important;
    position: absolute !important;
    left: 0 !important;
    top: 0 !important;
    width: 100% !important;
    height: 100% !important;
  }

  .print-container .katex .sqrt > .vlist-t,
  .katex .sqrt > .vlist-t {
    border-left-width: 0.04em !important;
    border-left-style: solid !important;
    border-left-color: transparent !important;
    display: inline-table !important;
    table-layout: auto !important;
    overflow: visible !important;
    position: relative !important;
  }

  .print-container .katex .sqrt .vlist-t .vlist-r .vlist .pstrut,
  .katex .sqrt .vlist-t .vlist-r .vlist .pstrut,
  .print-container .katex .sqrt .vlist-t .vlist-s,
  .katex .sqrt .vlist-t .vlist-s {
    min-width: 0 !important;
  }

  .print-container .katex .sqrt .sqrt-sign,
  .katex .sqrt .sqrt-sign {
    position: relative !important;
    overflow: visible !important;
  }

  .print-container .katex .sqrt > .root,
  .katex .sqrt > .root {
    margin-left: 0.27777778em !important;
    margin-right: -0.55555556em !important;
    position: relative !important;
  }

  .print-container .katex .msub,
  .katex .msub {
    position: relative !important;
    display: inline-block !important;
    margin-right: 0.05em !important;
  }

  .print-container .katex .msub .vlist,
  .katex .msub .vlist {
    position: relative !important;
    top: 0.3em !important;
    margin-right: 0.05em !important;
    font-size: 0.75em !important;
    vertical-align: baseline !important;
    line-height: normal !important;
  }

  .print-container .katex .msupsub,
  .katex .msupsub {
    vertical-align: baseline !important;
    display: inline-block !important;
    line-height: normal !important;
    position: relative !important;
  }

  .print-container .katex .msupsub .vlist-t,
  .katex .msupsub .vlist-t {
    display: table !important;
    line-height: normal !important;
    border-collapse: separate !important;
    border-spacing: 0 !important;
    margin-top: 0.05em !important;
    margin-bottom: 0.05em !important;
  }

  .print-container .katex .msupsub .vlist-r,
  .katex .msupsub .vlist-r {
    display: table-row !important;
    line-height: normal !important;
  }

  .print-container .katex .msupsub .sup,
  .katex .msupsub .sup {
    display: inline-block !important;
    vertical-align: baseline !important;
    line-height: normal !important;
    font-size: 0.85em !important;
  }

  .print-container .katex .msupsub .sub,
  .katex .msupsub .sub {
    display: inline-block !important;
    vertical-align: baseline !important;
    line-height: normal !important;
    font-size: 0.75em !important;
    position: relative !important;
    top: 0.3em !important;
  }
}
"#;

/// Rules of the authoring surface's math override sheet. Used as the start
/// of the math override layer whether or not the sheet itself is reachable.
pub const MATH_OVERRIDE_BASELINE: &str = r#"
.katex {
  font-size: 1em;
  color: inherit;
  font-family: KaTeX_Main, "Times New Roman", serif;
  line-height: normal !important;
  text-indent: 0;
  text-rendering: auto;
}

.katex:not(.katex-display) {
  display: inline-block;
  vertical-align: baseline;
  margin: 0 0.1em;
}

.katex-display {
  display: block;
  margin: 1em 0;
  text-align: center;
  overflow-x: auto;
  overflow-y: hidden;
}

.katex-display>.katex {
  display: inline-block;
  text-align: initial;
  margin: 0;
}

.katex .mfrac > .frac-line,
.katex-display .mfrac > .frac-line,
.katex:not(.katex-display) .mfrac > .frac-line,
.katex .frac-line,
.katex-display .frac-line,
.katex:not(.katex-display) .frac-line {
  border-bottom-width: 0.04em !important;
  min-height: 0.04em !important;
  margin-top: 0.188em !important;
  margin-bottom: 0.092em !important;
}

.katex .mfrac,
.katex-display .mfrac,
.katex:not(.katex-display) .mfrac {
  padding-top: 0.158em !important;
  padding-bottom: 0.082em !important;
}

.katex .sqrt {
  font-size: 1em;
}

.katex .sqrt > .vlist-t {
  border-left-width: 0.04em !important;
  border-left-style: solid !important;
  border-left-color: transparent !important;
  display: inline-table !important;
  table-layout: auto !important;
}

.katex .sqrt .vlist-t .vlist-r .vlist .pstrut,
.katex .sqrt .vlist-t .vlist-s {
  min-width: 0 !important;
}

.katex .sqrt .sqrt-sign {
  position: relative !important;
}

.katex .sqrt > .root {
  margin-left: 0.27777778em !important;
  margin-right: -0.55555556em !important;
}

.katex .msub {
  position: relative !important;
  display: inline-block !important;
  margin-right: 0.05em !important;
}

.katex .msub .vlist {
  position: relative !important;
  top: 0.3em !important;
  margin-right: 0.05em !important;
  font-size: 0.75em !important;
  vertical-align: baseline !important;
  line-height: normal !important;
}

.katex .msupsub {
  text-align: left !important;
}

.katex .msupsub .sup {
  font-size: 0.85em !important;
  vertical-align: baseline !important;
}

.katex .msupsub .sub {
  font-size: 0.75em !important;
  position: relative !important;
  top: 0.3em !important;
  vertical-align: baseline !important;
}

.katex * {
  color: inherit;
  line-height: normal !important;
}

.katex .vlist-t {
  line-height: normal !important;
}

.katex .vlist-r {
  line-height: normal !important;
}

.katex table {
  border-collapse: separate !important;
  border-spacing: 0;
}

.katex {
  color: #000000;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};

    #[test]
    fn print_layer_reflects_paper_configuration() {
        let paper = PaperConfig::new("A3 landscape", "420mm");
        let css = print_layer_css(&paper);
        assert!(css.contains("size: A3 landscape;"));
        assert!(css.contains("max-width: 420mm;"));
        assert!(css.contains("margin: 0;"));
        assert!(css.contains("break-inside: avoid !important"));
        let avoid = css.find(".section-block,").expect("break avoidance block");
        let media = css.find("@media print").expect("print media block");
        assert!(avoid < media);
    }

    #[test]
    fn builtin_sheets_parse() {
        let print = print_layer_css(&PaperConfig::default());
        for css in [print.as_str(), MATH_OVERRIDE_BASELINE] {
            assert!(
                StyleSheet::parse(css, ParserOptions::default()).is_ok(),
                "builtin css should parse"
            );
        }
    }

    #[test]
    fn print_math_metrics_match_override_baseline() {
        let print = print_layer_css(&PaperConfig::default());
        for metric in [
            "border-bottom-width: 0.04em !important;",
            "margin-top: 0.188em !important;",
            "margin-bottom: 0.092em !important;",
            "padding-top: 0.158em !important;",
            "padding-bottom: 0.082em !important;",
            "margin-left: 0.27777778em !important;",
            "margin-right: -0.55555556em !important;",
        ] {
            assert!(print.contains(metric), "print layer lacks {metric}");
            assert!(MATH_OVERRIDE_BASELINE.contains(metric), "baseline lacks {metric}");
        }
    }
}
