// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label content — one variant per label kind, each carrying exactly the
// fields that kind needs.  Assembled by the external data-access layer;
// this crate only lays the fields out.

use serde::{Deserialize, Serialize};

use labelrelay_core::JobType;

/// Barcode symbology for the label's machine-readable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    Code128,
    Code39,
    Ean13,
    Qr,
}

/// Structured label content, one variant per job type.
///
/// Optional fields are skipped entirely during layout — they reserve no
/// vertical space when absent.  Callers must validate required fields
/// (e.g. non-empty barcode content) before rendering; the renderer itself
/// never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LabelSpec {
    /// Production batch label.
    Batch {
        batch_number: String,
        product_title: String,
        quantity: u32,
        barcode: String,
        symbology: Symbology,
        week_code: Option<String>,
    },
    /// Point-of-sale price label.
    Sale {
        product_title: String,
        size: Option<String>,
        price_text: String,
        barcode: String,
        symbology: Symbology,
        footer: Option<String>,
        lot_number: Option<String>,
    },
    /// Warehouse location marker.
    Location {
        location_code: String,
        description: Option<String>,
        barcode: String,
        symbology: Symbology,
    },
    /// Shipping trolley manifest label.
    Trolley {
        trolley_number: String,
        customer: String,
        order_ref: Option<String>,
        barcode: String,
        symbology: Symbology,
    },
    /// EU plant passport (A: botanical name, B: producer registration,
    /// C: traceability code, D: country of origin).
    Passport {
        botanical_name: String,
        producer_code: String,
        traceability_code: String,
        origin_country: String,
    },
}

/// A layout block handed to the renderer, in top-to-bottom order.
#[derive(Debug, Clone)]
pub(crate) enum Block {
    /// Emphasized heading line.
    Title(String),
    /// Regular body line.
    Text(String),
    /// Large price line.
    Price(String),
    /// Machine-readable field.
    Barcode { data: String, symbology: Symbology },
}

impl LabelSpec {
    pub fn job_type(&self) -> JobType {
        match self {
            Self::Batch { .. } => JobType::Batch,
            Self::Sale { .. } => JobType::Sale,
            Self::Location { .. } => JobType::Location,
            Self::Trolley { .. } => JobType::Trolley,
            Self::Passport { .. } => JobType::Passport,
        }
    }

    /// The full-layout block stack for this label, absent optionals skipped.
    pub(crate) fn blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        match self {
            Self::Batch {
                batch_number,
                product_title,
                quantity,
                barcode,
                symbology,
                week_code,
            } => {
                blocks.push(Block::Title(product_title.clone()));
                blocks.push(Block::Text(format!("Batch {batch_number}")));
                blocks.push(Block::Text(format!("Qty {quantity}")));
                blocks.push(Block::Barcode {
                    data: barcode.clone(),
                    symbology: *symbology,
                });
                if let Some(week) = week_code {
                    blocks.push(Block::Text(format!("Week {week}")));
                }
            }
            Self::Sale {
                product_title,
                size,
                price_text,
                barcode,
                symbology,
                footer,
                lot_number,
            } => {
                blocks.push(Block::Title(product_title.clone()));
                if let Some(size) = size {
                    blocks.push(Block::Text(size.clone()));
                }
                blocks.push(Block::Price(price_text.clone()));
                blocks.push(Block::Barcode {
                    data: barcode.clone(),
                    symbology: *symbology,
                });
                if let Some(lot) = lot_number {
                    blocks.push(Block::Text(format!("Lot {lot}")));
                }
                if let Some(footer) = footer {
                    blocks.push(Block::Text(footer.clone()));
                }
            }
            Self::Location {
                location_code,
                description,
                barcode,
                symbology,
            } => {
                blocks.push(Block::Title(location_code.clone()));
                if let Some(description) = description {
                    blocks.push(Block::Text(description.clone()));
                }
                blocks.push(Block::Barcode {
                    data: barcode.clone(),
                    symbology: *symbology,
                });
            }
            Self::Trolley {
                trolley_number,
                customer,
                order_ref,
                barcode,
                symbology,
            } => {
                blocks.push(Block::Title(format!("Trolley {trolley_number}")));
                blocks.push(Block::Text(customer.clone()));
                if let Some(order_ref) = order_ref {
                    blocks.push(Block::Text(order_ref.clone()));
                }
                blocks.push(Block::Barcode {
                    data: barcode.clone(),
                    symbology: *symbology,
                });
            }
            Self::Passport {
                botanical_name,
                producer_code,
                traceability_code,
                origin_country,
            } => {
                blocks.push(Block::Title("Plant Passport".into()));
                blocks.push(Block::Text(format!("A {botanical_name}")));
                blocks.push(Block::Text(format!("B {producer_code}")));
                blocks.push(Block::Text(format!("C {traceability_code}")));
                blocks.push(Block::Text(format!("D {origin_country}")));
                blocks.push(Block::Barcode {
                    data: traceability_code.clone(),
                    symbology: Symbology::Qr,
                });
            }
        }
        blocks
    }

    /// Substitution pairs for custom templates: allow-listed token name to
    /// raw field value.  Absent optionals substitute as the empty string so
    /// a custom template shows a blank region rather than a stray token.
    pub(crate) fn tokens(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Batch {
                batch_number,
                product_title,
                quantity,
                barcode,
                week_code,
                ..
            } => vec![
                ("batchNumber", batch_number.clone()),
                ("productTitle", product_title.clone()),
                ("quantity", quantity.to_string()),
                ("barcode", barcode.clone()),
                ("weekCode", week_code.clone().unwrap_or_default()),
            ],
            Self::Sale {
                product_title,
                size,
                price_text,
                barcode,
                footer,
                lot_number,
                ..
            } => vec![
                ("productTitle", product_title.clone()),
                ("size", size.clone().unwrap_or_default()),
                ("priceText", price_text.clone()),
                ("barcode", barcode.clone()),
                ("footer", footer.clone().unwrap_or_default()),
                ("lotNumber", lot_number.clone().unwrap_or_default()),
            ],
            Self::Location {
                location_code,
                description,
                barcode,
                ..
            } => vec![
                ("locationCode", location_code.clone()),
                ("description", description.clone().unwrap_or_default()),
                ("barcode", barcode.clone()),
            ],
            Self::Trolley {
                trolley_number,
                customer,
                order_ref,
                barcode,
                ..
            } => vec![
                ("trolleyNumber", trolley_number.clone()),
                ("customer", customer.clone()),
                ("orderRef", order_ref.clone().unwrap_or_default()),
                ("barcode", barcode.clone()),
            ],
            Self::Passport {
                botanical_name,
                producer_code,
                traceability_code,
                origin_country,
            } => vec![
                ("botanicalName", botanical_name.clone()),
                ("producerCode", producer_code.clone()),
                ("traceabilityCode", traceability_code.clone()),
                ("originCountry", origin_country.clone()),
            ],
        }
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

    #[test]
    fn absent_optionals_produce_no_blocks() {
        let blocks = sale_spec().blocks();
        // Title, price, barcode only — no size, lot, or footer entries.
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn present_optionals_append_blocks() {
        let spec = LabelSpec::Sale {
            product_title: "Lavender".into(),
            size: Some("9cm pot".into()),
            price_text: "€5.99".into(),
            barcode: "123456".into(),
            symbology: Symbology::Code128,
            footer: Some("www.example.test".into()),
            lot_number: Some("L-44".into()),
        };
        assert_eq!(spec.blocks().len(), 6);
    }

    #[test]
    fn absent_optional_tokens_substitute_empty() {
        let tokens = sale_spec().tokens();
        let footer = tokens.iter().find(|(name, _)| *name == "footer");
        assert_eq!(footer.map(|(_, v)| v.as_str()), Some(""));
    }

    #[test]
    fn job_type_matches_variant() {
        assert_eq!(sale_spec().job_type(), labelrelay_core::JobType::Sale);
    }
}
