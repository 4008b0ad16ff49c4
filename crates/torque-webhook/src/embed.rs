//! Rich-embed construction for bill messages.
//!
//! Layout mirrors the message format the shop has always posted: a field
//! grid with date/mechanic/customer/plate/amount, the first two items
//! with a "…and N more" note, and a verification status line. Title and
//! color encode the sale's state.

use serde::{Deserialize, Serialize};

use torque_core::notifier::BillMessage;

pub const COLOR_VERIFIED: u32 = 0x10b981;
pub const COLOR_UNVERIFIED: u32 = 0xdc2626;
pub const COLOR_FAKE: u32 = 0xfbbf24;

pub const CAR_IMAGE_NAME: &str = "car_image.jpg";
pub const MECHANIC_SHEET_NAME: &str = "mechanic_sheet.jpg";

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

/// Where the embed's verification images come from on an edit.
#[derive(Debug, Clone)]
pub enum ImageRefs {
    /// Fresh uploads attached to this request.
    Attachments,
    /// URLs recovered from the existing message, carried forward.
    Existing { image_url: String, thumbnail_url: String },
    None,
}

impl ImageRefs {
    fn present(&self) -> bool {
        !matches!(self, ImageRefs::None)
    }
}

/// Embed for a freshly created bill.
pub fn create_embed(bill: &BillMessage, shop_name: &str, has_images: bool) -> Embed {
    let mut fields = bill_fields(bill);

    if bill.verified {
        fields.push(EmbedField {
            name: "✅ Verification Status".into(),
            value: if has_images {
                "**VERIFIED** - Images attached below".into()
            } else {
                "**AUTO-VERIFIED** (Repair Bill)".into()
            },
            inline: false,
        });
    }

    let (image, thumbnail) = attachment_refs(has_images);

    Embed {
        title: if bill.verified {
            "✅ New Bill Created (Verified)".into()
        } else {
            "🧾 New Bill Created".into()
        },
        color: if bill.verified { COLOR_VERIFIED } else { COLOR_UNVERIFIED },
        fields,
        footer: footer(bill, shop_name, false),
        timestamp: chrono::Utc::now().to_rfc3339(),
        image,
        thumbnail,
    }
}

/// Embed for an edited bill (totals saved, verified after the fact, or
/// fake-flagged).
pub fn edit_embed(bill: &BillMessage, shop_name: &str, images: &ImageRefs) -> Embed {
    let mut fields = bill_fields(bill);

    if images.present() {
        fields.push(EmbedField {
            name: "✅ Verification Status".into(),
            value: "**VERIFIED** - Images attached below".into(),
            inline: false,
        });
    }

    let (title, color) = if bill.fake {
        ("⚠️ FAKE BILL (MARKED)".to_string(), COLOR_FAKE)
    } else if images.present() {
        ("✅ Bill Verified".to_string(), COLOR_VERIFIED)
    } else {
        ("🧾 Bill Updated".to_string(), COLOR_UNVERIFIED)
    };

    let (image, thumbnail) = match images {
        ImageRefs::Attachments => attachment_refs(true),
        ImageRefs::Existing { image_url, thumbnail_url } => (
            Some(EmbedImage { url: image_url.clone() }),
            Some(EmbedImage { url: thumbnail_url.clone() }),
        ),
        ImageRefs::None => (None, None),
    };

    Embed {
        title,
        color,
        fields,
        footer: footer(bill, shop_name, bill.fake),
        timestamp: chrono::Utc::now().to_rfc3339(),
        image,
        thumbnail,
    }
}

fn attachment_refs(has_images: bool) -> (Option<EmbedImage>, Option<EmbedImage>) {
    if has_images {
        (
            Some(EmbedImage { url: format!("attachment://{CAR_IMAGE_NAME}") }),
            Some(EmbedImage { url: format!("attachment://{MECHANIC_SHEET_NAME}") }),
        )
    } else {
        (None, None)
    }
}

fn footer(bill: &BillMessage, shop_name: &str, fake: bool) -> EmbedFooter {
    let suffix = if fake { " | MARKED AS FAKE" } else { "" };
    EmbedFooter {
        text: format!("Bill ID: #{} | {}{}", bill.sale_id, shop_name, suffix),
    }
}

fn bill_fields(bill: &BillMessage) -> Vec<EmbedField> {
    let field = |name: &str, value: String, inline: bool| EmbedField {
        name: name.to_string(),
        value,
        inline,
    };

    vec![
        field("📅 Date", bill.date.clone(), true),
        field(
            "🔧 Mechanic",
            format!("{} (<@{}>)", bill.mechanic_name, bill.mechanic_discord_id),
            true,
        ),
        field("👤 Customer", bill.customer_name.clone(), true),
        field("🚗 Vehicle Plate", bill.vehicle_plate.clone(), true),
        field("📦 Total Items", bill.items.len().to_string(), true),
        field("💰 Bill Amount", money(bill.amount), true),
        field("📊 Weekly Sales (This Mechanic)", money(bill.weekly_sales), false),
        field("🛠️ Items & Services", items_list(bill), false),
    ]
}

/// First two items in full, the rest folded into a count.
fn items_list(bill: &BillMessage) -> String {
    if bill.items.is_empty() {
        return "No items".into();
    }

    let mut out = bill
        .items
        .iter()
        .take(2)
        .enumerate()
        .map(|(idx, item)| {
            format!(
                "{}. **{}** ({}) - {}\n   Qty: {} × {} = {}",
                idx + 1,
                item.name,
                item.kind,
                item.category,
                item.quantity,
                money(item.price),
                money(item.price * item.quantity as f64),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let remaining = bill.items.len().saturating_sub(2);
    if remaining > 0 {
        let plural = if remaining > 1 { "s" } else { "" };
        out.push_str(&format!("\n\n*...and {remaining} more item{plural}*"));
    }
    out
}

/// Whole-dollar display with thousands separators.
fn money(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("${sign}{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use torque_core::notifier::BillLine;
    use uuid::Uuid;

    fn line(name: &str, price: f64, quantity: u32) -> BillLine {
        BillLine {
            name: name.into(),
            category: "Performance".into(),
            kind: "Lv 1".into(),
            quantity,
            price,
        }
    }

    fn bill(items: Vec<BillLine>, verified: bool, fake: bool) -> BillMessage {
        BillMessage {
            sale_id: Uuid::nil(),
            date: "June 5, 2026, 02:30 PM".into(),
            mechanic_name: "mara vey".into(),
            mechanic_discord_id: "445566".into(),
            customer_name: "Roy Vance".into(),
            vehicle_plate: "ZX81KT".into(),
            amount: 11286.0,
            weekly_sales: 42000.0,
            items,
            verified,
            fake,
        }
    }

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(11286.0), "$11,286");
        assert_eq!(money(500.0), "$500");
        assert_eq!(money(1234567.4), "$1,234,567");
        assert_eq!(money(-950.0), "$-950");
    }

    #[test]
    fn items_list_truncates_after_two() {
        let b = bill(
            vec![
                line("ENGINE UPGRADE", 8000.0, 1),
                line("SPOILER", 1500.0, 2),
                line("NEONS", 1500.0, 1),
                line("RESPRAY", 800.0, 1),
            ],
            false,
            false,
        );
        let list = items_list(&b);
        assert!(list.contains("1. **ENGINE UPGRADE**"));
        assert!(list.contains("Qty: 2 × $1,500 = $3,000"));
        assert!(list.contains("*...and 2 more items*"));
        assert!(!list.contains("NEONS"));
    }

    #[test]
    fn unverified_create_embed_is_red() {
        let e = create_embed(&bill(vec![line("SPOILER", 1500.0, 1)], false, false), "Torque Auto Works", false);
        assert_eq!(e.title, "🧾 New Bill Created");
        assert_eq!(e.color, COLOR_UNVERIFIED);
        assert!(e.image.is_none());
        assert!(!e.fields.iter().any(|f| f.name.contains("Verification")));
    }

    #[test]
    fn verified_create_embed_without_images_is_auto() {
        let e = create_embed(&bill(vec![line("SPOILER", 1500.0, 1)], true, false), "Torque Auto Works", false);
        assert_eq!(e.color, COLOR_VERIFIED);
        let status = e.fields.iter().find(|f| f.name.contains("Verification")).unwrap();
        assert!(status.value.contains("AUTO-VERIFIED"));
    }

    #[test]
    fn create_embed_with_images_references_attachments() {
        let e = create_embed(&bill(vec![line("SPOILER", 1500.0, 1)], true, false), "Torque Auto Works", true);
        assert_eq!(e.image.unwrap().url, "attachment://car_image.jpg");
        assert_eq!(e.thumbnail.unwrap().url, "attachment://mechanic_sheet.jpg");
    }

    #[test]
    fn fake_edit_embed_overrides_title_and_footer() {
        let e = edit_embed(
            &bill(vec![line("SPOILER", 1500.0, 1)], true, true),
            "Torque Auto Works",
            &ImageRefs::None,
        );
        assert_eq!(e.title, "⚠️ FAKE BILL (MARKED)");
        assert_eq!(e.color, COLOR_FAKE);
        assert!(e.footer.text.ends_with("MARKED AS FAKE"));
    }

    #[test]
    fn edit_embed_carries_existing_image_urls_forward() {
        let e = edit_embed(
            &bill(vec![line("SPOILER", 1500.0, 1)], true, false),
            "Torque Auto Works",
            &ImageRefs::Existing {
                image_url: "https://cdn.example/car.jpg".into(),
                thumbnail_url: "https://cdn.example/sheet.jpg".into(),
            },
        );
        assert_eq!(e.title, "✅ Bill Verified");
        assert_eq!(e.image.unwrap().url, "https://cdn.example/car.jpg");
        assert_eq!(e.thumbnail.unwrap().url, "https://cdn.example/sheet.jpg");
    }
}
