use axum::{
    Extension,
    extract::{Path, State},
    response::{Html, IntoResponse},
};
use uuid::Uuid;

use torque_types::models::{Sale, SaleItem};
use torque_types::session::Session;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};
use crate::sales::authorize_sale_access;

/// Standalone printable HTML document for one bill. The client opens it
/// in a new tab and prints to PDF; nothing here feeds back into the
/// lifecycle.
pub async fn render_invoice(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (sale_row, item_rows, mechanic_row) = run_db(&state, move |db| {
        let Some(sale) = db.get_sale(&sale_id.to_string())? else {
            return Ok(None);
        };
        let items = db.list_items_by_sale(&sale_id.to_string())?;
        let mechanic = db.get_employee(&sale.employee_id)?;
        Ok(Some((sale, items, mechanic)))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("sale not found: {sale_id}")))?;

    let sale = sale_row.into_sale();
    authorize_sale_access(&session, &sale)?;

    let items: Vec<SaleItem> = item_rows.into_iter().map(|r| r.into_sale_item()).collect();
    let mechanic_name = mechanic_row
        .map(|r| r.character_name)
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Html(render(&sale, &items, &mechanic_name)))
}

fn render(sale: &Sale, items: &[SaleItem], mechanic_name: &str) -> String {
    let invoice_no = sale.id.simple().to_string()[..8].to_uppercase();
    let date = sale.created_at.format("%B %-d, %Y").to_string();
    let time = sale.created_at.format("%I:%M %p").to_string();

    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&item.item_name),
                escape(&item.item_category),
                escape(&item.item_type),
                item.quantity,
                money(item.price),
                money(item.subtotal),
            )
        })
        .collect();

    let discount_row = if sale.discount_percentage > 0.0 {
        format!(
            "<div class=\"line\"><span>Discount ({:.0}%)</span><span>-{}</span></div>",
            sale.discount_percentage,
            money(sale.discount_amount)
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Torque Auto Works - Invoice #{invoice_no}</title>
<style>
  @media print {{
    @page {{ size: A4; margin: 0; }}
    body {{ margin: 0; padding: 0; }}
    .no-print {{ display: none !important; }}
  }}
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{
    font-family: 'Roboto', Arial, sans-serif;
    background: #0a0a0a;
    color: #fff;
    padding: 20px;
  }}
  .container {{
    max-width: 850px;
    margin: 0 auto;
    background: #1a1a1a;
    border: 3px solid #dc2626;
    padding: 40px;
  }}
  .header {{
    text-align: center;
    padding-bottom: 30px;
    margin-bottom: 40px;
    border-bottom: 3px solid #dc2626;
  }}
  .header h1 {{
    color: #dc2626;
    font-size: 42px;
    letter-spacing: 4px;
    -webkit-print-color-adjust: exact;
    print-color-adjust: exact;
  }}
  .header .subtitle {{
    color: #ef4444;
    font-size: 18px;
    letter-spacing: 3px;
    text-transform: uppercase;
  }}
  .meta {{
    display: flex;
    justify-content: space-between;
    margin-bottom: 30px;
    padding: 20px;
    background: rgba(0, 0, 0, 0.3);
    border-left: 4px solid #dc2626;
  }}
  .meta label, .totals span.label {{
    display: block;
    color: #ef4444;
    font-size: 11px;
    letter-spacing: 1.5px;
    text-transform: uppercase;
    margin-bottom: 6px;
  }}
  table {{ width: 100%; border-collapse: collapse; margin-bottom: 25px; }}
  th {{
    background: #dc2626;
    color: #fff;
    padding: 14px 12px;
    text-align: left;
    font-size: 12px;
    letter-spacing: 1.5px;
    text-transform: uppercase;
  }}
  td {{ padding: 12px; border-bottom: 1px solid rgba(255, 255, 255, 0.08); font-size: 14px; }}
  td:last-child, th:last-child {{ text-align: right; }}
  .totals {{ margin-left: auto; width: 320px; }}
  .totals .line {{
    display: flex;
    justify-content: space-between;
    padding: 8px 0;
    border-bottom: 1px solid rgba(255, 255, 255, 0.08);
  }}
  .totals .grand {{ color: #dc2626; font-size: 22px; font-weight: 700; border-bottom: none; }}
  .footer {{
    margin-top: 40px;
    text-align: center;
    color: #9ca3af;
    font-size: 12px;
    letter-spacing: 1px;
  }}
</style>
</head>
<body>
<div class="container">
  <div class="header">
    <h1>TORQUE AUTO WORKS</h1>
    <p class="subtitle">Custom Builds &amp; Repairs</p>
  </div>
  <div class="meta">
    <div><label>Invoice</label><p>#{invoice_no}</p></div>
    <div><label>Date</label><p>{date} {time}</p></div>
    <div><label>Mechanic</label><p>{mechanic}</p></div>
    <div><label>Customer</label><p>{customer}</p></div>
    <div><label>Vehicle Plate</label><p>{plate}</p></div>
  </div>
  <table>
    <thead>
      <tr><th>Item</th><th>Category</th><th>Type</th><th>Qty</th><th>Price</th><th>Subtotal</th></tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
  <div class="totals">
    <div class="line"><span>Subtotal</span><span>{subtotal}</span></div>
    {discount_row}
    <div class="line"><span>Tax (14%)</span><span>{tax}</span></div>
    <div class="line grand"><span>Total</span><span>{total}</span></div>
  </div>
  <div class="footer">Thank you for your business — Torque Auto Works</div>
</div>
</body>
</html>
"#,
        invoice_no = invoice_no,
        date = date,
        time = time,
        mechanic = escape(mechanic_name),
        customer = escape(&sale.customer_name),
        plate = escape(&sale.vehicle_plate),
        rows = rows,
        subtotal = money(sale.subtotal),
        discount_row = discount_row,
        tax = money(sale.tax_amount),
        total = money(sale.total_amount),
    )
}

/// Whole-dollar display with thousands separators, matching the webhook
/// message formatting.
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

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
