// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZPL rendering — deterministic layout of label blocks into command text.
//
// Two built-in layouts, chosen by physical size: *compact* for labels no
// larger than 45 mm on either side (barcode first, centered text), *full*
// for everything else (left-aligned top-down stack).  A template may instead
// carry raw custom ZPL with {{token}} placeholders.

use crate::spec::{Block, LabelSpec, Symbology};
use crate::template::Template;

// Field metrics in millimetres; converted per-template so they scale with
// the print head resolution.
const TITLE_FONT_MM: f64 = 4.0;
const BODY_FONT_MM: f64 = 3.0;
const PRICE_FONT_MM: f64 = 5.0;
const FIELD_GAP_MM: f64 = 1.2;
const BARCODE_HEIGHT_MM: f64 = 10.0;
const BARCODE_HEIGHT_COMPACT_MM: f64 = 8.0;
/// Height of the human-readable line printed under linear barcodes.
const INTERPRETATION_MM: f64 = 3.0;
/// Nominal square size reserved for a QR code.
const QR_SIZE_MM: f64 = 12.0;

/// Render a label to ZPL command text.
///
/// Deterministic and idempotent: identical inputs yield byte-identical
/// output.  Missing optional fields are skipped, never errors.  Exactly one
/// `^PQ` repeat directive is emitted, equal to `copies` (clamped to 1).
pub fn render(spec: &LabelSpec, template: &Template, copies: u32) -> String {
    let copies = copies.max(1);
    if let Some(raw) = &template.custom_zpl {
        return render_custom(raw, spec, copies);
    }
    render_builtin(spec, template, copies)
}

/// Escape ZPL control characters in free text.
///
/// Fields are emitted under `^FH` (hex-escape mode, `_` prefix), so the
/// caret, backslash, and tilde from user-entered text become harmless hex
/// escapes instead of corrupting the command stream.  The underscore itself
/// must be escaped first since it is the escape introducer.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' => out.push_str("_5f"),
            '^' => out.push_str("_5e"),
            '\\' => out.push_str("_5c"),
            '~' => out.push_str("_7e"),
            _ => out.push(ch),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Custom templates
// ---------------------------------------------------------------------------

/// Substitute allow-listed `{{token}}` placeholders and ensure a single
/// repeat directive.
///
/// Tokens not on the variant's allow-list are left verbatim in the output —
/// not substituted, not deleted — so a typo in a user-authored template is
/// visible on the printed label rather than silently invoking anything.
fn render_custom(raw: &str, spec: &LabelSpec, copies: u32) -> String {
    let mut out = raw.to_owned();
    for (name, value) in spec.tokens() {
        let token = format!("{{{{{name}}}}}");
        if out.contains(&token) {
            out = out.replace(&token, &escape(&value));
        }
    }

    // Respect a template that declares its own repeat directive; otherwise
    // inject ours immediately after the command-stream start marker.
    if !out.contains("^PQ") {
        let directive = format!("^PQ{copies}");
        match out.find("^XA") {
            Some(pos) => out.insert_str(pos + 3, &directive),
            None => out.insert_str(0, &directive),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Built-in layouts
// ---------------------------------------------------------------------------

fn render_builtin(spec: &LabelSpec, template: &Template, copies: u32) -> String {
    let width = template.printable_width_dots();
    let margin = template.dots(template.margin_mm);

    let mut zpl = String::new();
    zpl.push_str("^XA\n");
    // UTF-8 text encoding.
    zpl.push_str("^CI28\n");
    zpl.push_str(&format!("^PW{}\n", template.dots(template.width_mm)));
    zpl.push_str(&format!("^LL{}\n", template.dots(template.height_mm)));
    zpl.push_str(&format!("^LH{margin},{margin}\n"));
    zpl.push_str(&format!("^PQ{copies}\n"));

    if template.show_border {
        let border_height = template.dots(template.height_mm - 2.0 * template.margin_mm);
        zpl.push_str(&format!("^FO0,0^GB{width},{border_height},2^FS\n"));
    }

    let blocks = spec.blocks();
    if template.is_compact() {
        layout_compact(&mut zpl, &blocks, template, width);
    } else {
        layout_full(&mut zpl, &blocks, template);
    }

    zpl.push_str("^XZ");
    zpl
}

/// Full layout: left-aligned stack, blocks in label order.
fn layout_full(zpl: &mut String, blocks: &[Block], template: &Template) {
    let gap = template.dots(FIELD_GAP_MM);
    let mut y = 0u32;
    for block in blocks {
        y += place_block(zpl, block, template, y, None) + gap;
    }
}

/// Compact layout: barcodes first, then the text blocks centered across the
/// printable width.
fn layout_compact(zpl: &mut String, blocks: &[Block], template: &Template, width: u32) {
    let gap = template.dots(FIELD_GAP_MM);
    let mut y = 0u32;
    for block in blocks.iter().filter(|b| matches!(b, Block::Barcode { .. })) {
        y += place_block(zpl, block, template, y, None) + gap;
    }
    for block in blocks.iter().filter(|b| !matches!(b, Block::Barcode { .. })) {
        y += place_block(zpl, block, template, y, Some(width)) + gap;
    }
}

/// Emit one block at vertical position `y`; returns the block's height in
/// dots.  `center_width` switches text fields to a centered field block.
fn place_block(
    zpl: &mut String,
    block: &Block,
    template: &Template,
    y: u32,
    center_width: Option<u32>,
) -> u32 {
    match block {
        Block::Title(text) => {
            let height = template.dots(TITLE_FONT_MM);
            let char_width = if template.bold_title {
                template.dots(TITLE_FONT_MM * 1.2)
            } else {
                height
            };
            place_text(zpl, text, height, char_width, y, center_width);
            height
        }
        Block::Text(text) => {
            let height = template.dots(BODY_FONT_MM);
            place_text(zpl, text, height, height, y, center_width);
            height
        }
        Block::Price(text) => {
            let height = template.dots(PRICE_FONT_MM);
            place_text(zpl, text, height, height, y, center_width);
            height
        }
        Block::Barcode { data, symbology } => {
            let compact = template.is_compact();
            let bar_height = template.dots(if compact {
                BARCODE_HEIGHT_COMPACT_MM
            } else {
                BARCODE_HEIGHT_MM
            });
            match symbology {
                Symbology::Code128 => {
                    zpl.push_str(&format!(
                        "^FO0,{y}^BY2^BCN,{bar_height},Y,N,N^FH^FD{}^FS\n",
                        escape(data)
                    ));
                    bar_height + template.dots(INTERPRETATION_MM)
                }
                Symbology::Code39 => {
                    zpl.push_str(&format!(
                        "^FO0,{y}^BY2^B3N,N,{bar_height},Y,N^FH^FD{}^FS\n",
                        escape(data)
                    ));
                    bar_height + template.dots(INTERPRETATION_MM)
                }
                Symbology::Ean13 => {
                    zpl.push_str(&format!(
                        "^FO0,{y}^BY2^BEN,{bar_height},Y,N^FH^FD{}^FS\n",
                        escape(data)
                    ));
                    bar_height + template.dots(INTERPRETATION_MM)
                }
                Symbology::Qr => {
                    zpl.push_str(&format!(
                        "^FO0,{y}^BQN,2,4^FH^FDQA,{}^FS\n",
                        escape(data)
                    ));
                    template.dots(QR_SIZE_MM)
                }
            }
        }
    }
}

fn place_text(
    zpl: &mut String,
    text: &str,
    height: u32,
    char_width: u32,
    y: u32,
    center_width: Option<u32>,
) {
    match center_width {
        Some(width) => zpl.push_str(&format!(
            "^FO0,{y}^FB{width},1,0,C,0^A0N,{height},{char_width}^FH^FD{}^FS\n",
            escape(text)
        )),
        None => zpl.push_str(&format!(
            "^FO0,{y}^A0N,{height},{char_width}^FH^FD{}^FS\n",
            escape(text)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_spec() -> LabelSpec {
        LabelSpec::Sale {
            product_title: "Lavender".into(),
            size: None,
            price_text: "€5.99".into(),
            barcode: "123456".into(),
            symbology: Symbology::Code128,
            footer: None,
            lot_number: None,
        }
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn render_is_deterministic() {
        let template = Template::new(40.0, 40.0);
        let first = render(&sale_spec(), &template, 3);
        let second = render(&sale_spec(), &template, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn compact_sale_label_scenario() {
        // 40x40mm, Lavender / €5.99 / 123456, 3 copies.
        let template = Template::new(40.0, 40.0);
        let zpl = render(&sale_spec(), &template, 3);

        assert_eq!(count(&zpl, "^PQ"), 1, "exactly one repeat directive");
        assert!(zpl.contains("^PQ3"));
        assert_eq!(count(&zpl, "^BC"), 1, "exactly one barcode field");
        assert!(zpl.contains("^FD123456^FS"));
        // Compact layout centers text fields.
        assert!(zpl.contains("^FB"));
        // Barcode comes before the title.
        let barcode_pos = zpl.find("^BC").unwrap();
        let title_pos = zpl.find("Lavender").unwrap();
        assert!(barcode_pos < title_pos);
    }

    #[test]
    fn large_label_uses_full_layout() {
        let template = Template::new(100.0, 60.0);
        let zpl = render(&sale_spec(), &template, 1);
        assert!(!zpl.contains("^FB"), "full layout is left-aligned");
        // Title first, barcode after price.
        let title_pos = zpl.find("Lavender").unwrap();
        let barcode_pos = zpl.find("^BC").unwrap();
        assert!(title_pos < barcode_pos);
    }

    #[test]
    fn single_copy_still_emits_one_repeat_directive() {
        let zpl = render(&sale_spec(), &Template::new(40.0, 40.0), 1);
        assert_eq!(count(&zpl, "^PQ"), 1);
        assert!(zpl.contains("^PQ1"));
    }

    #[test]
    fn zero_copies_clamps_to_one() {
        let zpl = render(&sale_spec(), &Template::new(40.0, 40.0), 0);
        assert!(zpl.contains("^PQ1"));
    }

    #[test]
    fn absent_optionals_reserve_no_space() {
        let template = Template::new(100.0, 60.0);
        let bare = render(&sale_spec(), &template, 1);

        let full = LabelSpec::Sale {
            product_title: "Lavender".into(),
            size: Some("9cm pot".into()),
            price_text: "€5.99".into(),
            barcode: "123456".into(),
            symbology: Symbology::Code128,
            footer: Some("Keep watered".into()),
            lot_number: Some("L-44".into()),
        };
        let with_optionals = render(&full, &template, 1);

        assert_eq!(count(&bare, "^FO"), 3);
        assert_eq!(count(&with_optionals, "^FO"), 6);
    }

    #[test]
    fn control_characters_are_escaped() {
        let spec = LabelSpec::Sale {
            product_title: "Lav^en~der \\ Co".into(),
            size: None,
            price_text: "€5.99".into(),
            barcode: "123456".into(),
            symbology: Symbology::Code128,
            footer: None,
            lot_number: None,
        };
        let zpl = render(&spec, &Template::new(40.0, 40.0), 1);
        assert!(!zpl.contains("Lav^en"));
        assert!(zpl.contains("Lav_5een_7eder _5c Co"));
    }

    #[test]
    fn escape_handles_the_escape_introducer_itself() {
        assert_eq!(escape("a_b^c"), "a_5fb_5ec");
    }

    #[test]
    fn symbology_commands() {
        let template = Template::new(100.0, 60.0);
        let mk = |symbology| LabelSpec::Location {
            location_code: "A-01-02".into(),
            description: None,
            barcode: "4006381333931".into(),
            symbology,
        };
        assert!(render(&mk(Symbology::Code39), &template, 1).contains("^B3N"));
        assert!(render(&mk(Symbology::Ean13), &template, 1).contains("^BEN"));
        assert!(render(&mk(Symbology::Qr), &template, 1).contains("^BQN"));
    }

    #[test]
    fn passport_renders_all_four_lines() {
        let spec = LabelSpec::Passport {
            botanical_name: "Lavandula angustifolia".into(),
            producer_code: "NL-12345".into(),
            traceability_code: "T-2026-08-001".into(),
            origin_country: "NL".into(),
        };
        let zpl = render(&spec, &Template::new(100.0, 60.0), 1);
        assert!(zpl.contains("Plant Passport"));
        assert!(zpl.contains("A Lavandula angustifolia"));
        assert!(zpl.contains("B NL-12345"));
        assert!(zpl.contains("C T-2026-08-001"));
        assert!(zpl.contains("D NL"));
    }

    // -- Custom templates --

    fn custom_template(raw: &str) -> Template {
        let mut template = Template::new(50.0, 30.0);
        template.custom_zpl = Some(raw.into());
        template
    }

    #[test]
    fn custom_template_substitutes_allowed_tokens() {
        let template =
            custom_template("^XA^FO10,10^A0N,30,30^FD{{productTitle}} {{priceText}}^FS^XZ");
        let zpl = render(&sale_spec(), &template, 1);
        assert!(zpl.contains("^FDLavender €5.99^FS"));
    }

    #[test]
    fn custom_template_leaves_unknown_tokens_verbatim() {
        let template = custom_template("^XA^FD{{unknownField}}^FS^XZ");
        let zpl = render(&sale_spec(), &template, 1);
        assert!(zpl.contains("{{unknownField}}"));
    }

    #[test]
    fn custom_template_substitution_escapes_values() {
        let spec = LabelSpec::Sale {
            product_title: "Ro^se".into(),
            size: None,
            price_text: "€2".into(),
            barcode: "1".into(),
            symbology: Symbology::Code128,
            footer: None,
            lot_number: None,
        };
        let template = custom_template("^XA^FH^FD{{productTitle}}^FS^XZ");
        let zpl = render(&spec, &template, 1);
        assert!(zpl.contains("Ro_5ese"));
    }

    #[test]
    fn custom_template_gets_repeat_directive_after_start_marker() {
        let template = custom_template("^XA^FDhello^FS^XZ");
        let zpl = render(&sale_spec(), &template, 4);
        assert!(zpl.starts_with("^XA^PQ4"));
        assert_eq!(zpl.matches("^PQ").count(), 1);
    }

    #[test]
    fn custom_template_with_own_repeat_directive_is_untouched() {
        let template = custom_template("^XA^PQ2^FDhello^FS^XZ");
        let zpl = render(&sale_spec(), &template, 4);
        assert_eq!(zpl.matches("^PQ").count(), 1);
        assert!(zpl.contains("^PQ2"));
        assert!(!zpl.contains("^PQ4"));
    }

    #[test]
    fn absent_optional_token_renders_blank() {
        // footer is None — the token substitutes to empty, not an error.
        let template = custom_template("^XA^FD[{{footer}}]^FS^XZ");
        let zpl = render(&sale_spec(), &template, 1);
        assert!(zpl.contains("^FD[]^FS"));
    }
}
