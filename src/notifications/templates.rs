//! Dutch transactional email bodies.

use rust_decimal::Decimal;

use crate::models::{EmailMessage, Order};
use crate::validation::AbandonedCartRequest;

const SHOP_NAME: &str = "Gameshop Enter";
const FOOTER: &str = r#"<p style="color:#6b7280;font-size:12px;">Vragen? <a href="https://gameshopenter.nl/contact" style="color:#10b981;">Neem contact op</a></p>
<p style="color:#6b7280;font-size:12px;">&copy; Gameshop Enter</p>"#;

/// Escapes text for inclusion in HTML element content and attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn euro(amount: Decimal) -> String {
    format!("&euro;{:.2}", amount.round_dp(2))
}

fn wrap(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"></head><body style="font-family:Arial,sans-serif;color:#333;">
<div style="max-width:600px;margin:0 auto;padding:20px;">
<h1 style="color:#10b981;">{title}</h1>
{body}
<hr style="margin:30px 0;border:none;border-top:1px solid #e5e7eb;">
{footer}
</div></body></html>"#,
        title = title,
        body = body,
        footer = FOOTER
    )
}

fn item_rows(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td style=\"text-align:center;\">{}</td><td style=\"text-align:right;\">{}</td></tr>",
                escape_html(&item.name),
                item.quantity,
                euro(item.line_total())
            )
        })
        .collect()
}

fn totals(order: &Order) -> String {
    let mut rows = format!(
        "<p>Subtotaal: {}</p><p>Verzendkosten: {}</p>",
        euro(order.subtotal),
        euro(order.shipping)
    );
    if !order.discount.is_zero() {
        rows.push_str(&format!("<p>Korting: -{}</p>", euro(order.discount)));
    }
    rows.push_str(&format!("<p><strong>Totaal: {}</strong></p>", euro(order.total)));
    rows
}

fn address_block(order: &Order) -> String {
    let a = &order.address;
    format!(
        "<p>{} {}<br>{} {}</p>",
        escape_html(&a.street),
        escape_html(&a.house_number),
        escape_html(&a.postcode),
        escape_html(&a.city)
    )
}

pub fn order_confirmation(order: &Order, to: &str) -> EmailMessage {
    let body = format!(
        r#"<p>Hallo {name},</p>
<p>Bedankt voor je bestelling <strong>{number}</strong>! We gaan direct voor je aan de slag.</p>
<table style="width:100%;border-collapse:collapse;">{rows}</table>
{totals}
<h3>Verzendadres</h3>{address}
<p>Je ontvangt binnenkort een verzendmail met track &amp; trace. Verwachte levertijd: 1-3 werkdagen.</p>"#,
        name = escape_html(&order.customer_name),
        number = escape_html(&order.order_number),
        rows = item_rows(order),
        totals = totals(order),
        address = address_block(order),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Bestelbevestiging - {}", order.order_number),
        html: wrap("Bedankt voor je bestelling!", &body),
        text: Some(format!(
            "Bedankt voor je bestelling {}. Je zult binnenkort een track & trace e-mail ontvangen.",
            order.order_number
        )),
        reply_to: None,
    }
}

pub fn owner_notification(order: &Order, owner_address: &str) -> EmailMessage {
    let body = format!(
        r#"<p>Er is een nieuwe betaalde bestelling binnengekomen.</p>
<p><strong>Bestelnummer:</strong> {number}<br>
<strong>Klant:</strong> {name}<br>
<strong>E-mail:</strong> {email}<br>
<strong>Betaalmethode:</strong> {method}</p>
<table style="width:100%;border-collapse:collapse;">{rows}</table>
{totals}
<h3>Verzendadres</h3>{address}
<p><strong>Opmerkingen:</strong> {comments}</p>"#,
        number = escape_html(&order.order_number),
        name = escape_html(&order.customer_name),
        email = escape_html(order.customer_email.as_deref().unwrap_or("onbekend")),
        method = escape_html(order.payment_method.as_deref().unwrap_or("onbekend")),
        rows = item_rows(order),
        totals = totals(order),
        address = address_block(order),
        comments = escape_html(order.comments.as_deref().unwrap_or("-")),
    );

    EmailMessage {
        to: owner_address.to_string(),
        subject: format!(
            "Nieuwe bestelling {} ({})",
            order.order_number,
            euro(order.total).replace("&euro;", "EUR ")
        ),
        html: wrap("Nieuwe bestelling", &body),
        text: Some(format!(
            "Nieuwe bestelling {} van {}",
            order.order_number, order.customer_name
        )),
        reply_to: order.customer_email.clone(),
    }
}

pub fn tracking_notice(
    to: &str,
    customer_name: &str,
    order_number: &str,
    tracking_code: &str,
    tracking_url: &str,
) -> EmailMessage {
    let body = format!(
        r#"<p>Hallo {name},</p>
<p>Goed nieuws! Je bestelling is verzonden en onderweg naar jou.</p>
<p style="font-size:12px;color:#6b7280;">Volgnummer</p>
<p style="font-size:24px;font-weight:bold;font-family:monospace;">{code}</p>
<p><a href="{url}" style="background-color:#10b981;color:white;padding:12px 20px;border-radius:8px;text-decoration:none;">Track &amp; Trace</a></p>
<p>Jouw ordernummer: <strong>{number}</strong></p>"#,
        name = escape_html(customer_name),
        code = escape_html(tracking_code),
        url = escape_html(tracking_url),
        number = escape_html(order_number),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Je bestelling is verzonden (#{})", order_number),
        html: wrap("Je bestelling is onderweg!", &body),
        text: Some(format!(
            "Je bestelling {} is verzonden. Volg je pakket: {}",
            order_number, tracking_url
        )),
        reply_to: None,
    }
}

pub fn welcome(to: &str, discount_code: &str, percentage: u32) -> EmailMessage {
    let body = format!(
        r#"<p>Bedankt voor je aanmelding voor de nieuwsbrief van {shop}.</p>
<p>Als welkomstcadeau krijg je {pct}% korting op je eerste bestelling met de code:</p>
<p style="font-size:24px;font-weight:bold;font-family:monospace;letter-spacing:2px;">{code}</p>
<p>De code is eenmalig te gebruiken.</p>"#,
        shop = SHOP_NAME,
        pct = percentage,
        code = escape_html(discount_code),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Welkom bij {} - Je kortingscode!", SHOP_NAME),
        html: wrap("Welkom!", &body),
        text: Some(format!(
            "Welkom! Je ontvangt {}% korting met code: {}",
            percentage, discount_code
        )),
        reply_to: None,
    }
}

pub fn abandoned_cart(cart: &AbandonedCartRequest) -> EmailMessage {
    let rows: String = cart
        .cart_items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td style=\"text-align:center;\">{}</td><td style=\"text-align:right;\">{}</td></tr>",
                escape_html(&item.name),
                item.quantity,
                euro(item.price)
            )
        })
        .collect();

    let body = format!(
        r#"<p>Hallo {name},</p>
<p>Je liet enkele items in je winkelwagen liggen. Je kunt je aankoop nog altijd afmaken:</p>
<table style="width:100%;border-collapse:collapse;">
<tr><th style="text-align:left;">Product</th><th>Aantal</th><th style="text-align:right;">Prijs</th></tr>
{rows}
</table>
<p><strong>Totaal: {total}</strong></p>
<p><a href="{url}" style="background-color:#10b981;color:white;padding:12px 20px;border-radius:8px;text-decoration:none;">Afmaken aankoop</a></p>
<p style="color:#6b7280;font-size:14px;">Deze items liggen nog 7 dagen in je winkelwagen.</p>"#,
        name = escape_html(&cart.customer_name),
        rows = rows,
        total = euro(cart.cart_total),
        url = escape_html(&cart.cart_url),
    );

    EmailMessage {
        to: cart.customer_email.clone(),
        subject: "Je hebt iets in je winkelwagen laten liggen!".to_string(),
        html: wrap("Je hebt iets vergeten!", &body),
        text: Some(format!(
            "Hoi {}, je liet {} item(s) achter in je winkelwagen {}.",
            cart.customer_name,
            cart.cart_items.len(),
            cart.reminder_type.delay_text()
        )),
        reply_to: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, OrderStatus, ShippingAddress};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order {
            order_number: "GE-ABC".into(),
            customer_name: "Jan <script>".into(),
            customer_email: Some("jan@example.nl".into()),
            items: vec![OrderItem {
                name: "Pokémon Red".into(),
                sku: "GB-001".into(),
                quantity: 2,
                price: dec!(20),
            }],
            subtotal: dec!(40),
            shipping: dec!(4.95),
            discount: dec!(4),
            total: dec!(40.95),
            discount_code: Some("GE-XYZ123".into()),
            address: ShippingAddress {
                street: "Dorpsstraat".into(),
                house_number: "1".into(),
                postcode: "1234AB".into(),
                city: "Enter".into(),
            },
            payment_method: Some("ideal".into()),
            comments: None,
            status: OrderStatus::Processing,
            created_at: Utc::now(),
            tracking_code: None,
            tracking_url: None,
            label_reference: None,
            shipped_at: None,
            payment_id: None,
            paid_at: None,
        }
    }

    #[test]
    fn confirmation_escapes_customer_input() {
        let message = order_confirmation(&order(), "jan@example.nl");
        assert_eq!(message.subject, "Bestelbevestiging - GE-ABC");
        assert!(message.html.contains("Jan &lt;script&gt;"));
        assert!(!message.html.contains("<script>"));
        assert!(message.html.contains("&euro;40.00"));
        assert!(message.html.contains("Korting: -&euro;4.00"));
    }

    #[test]
    fn owner_notification_replies_to_customer() {
        let message = owner_notification(&order(), "owner@gameshopenter.nl");
        assert_eq!(message.to, "owner@gameshopenter.nl");
        assert_eq!(message.reply_to.as_deref(), Some("jan@example.nl"));
        assert!(message.subject.contains("EUR 40.95"));
    }

    #[test]
    fn welcome_mentions_code_and_percentage() {
        let message = welcome("a@b.nl", "GE-ABC123", 10);
        assert!(message.html.contains("GE-ABC123"));
        assert!(message.text.unwrap_or_default().contains("10%"));
    }

    #[test]
    fn abandoned_cart_lists_items_and_reminder_delay() {
        let cart = AbandonedCartRequest {
            customer_email: "jan@example.nl".into(),
            customer_name: "Jan".into(),
            cart_items: vec![crate::validation::AbandonedCartItem {
                name: "Mario <Kart>".into(),
                quantity: 2,
                price: dec!(35),
            }],
            cart_total: dec!(70),
            cart_url: "https://gameshopenter.nl/winkelwagen".into(),
            reminder_type: crate::models::ReminderType::Second,
        };

        let message = abandoned_cart(&cart);
        assert_eq!(message.to, "jan@example.nl");
        assert!(message.html.contains("Mario &lt;Kart&gt;"));
        assert!(message.html.contains("Totaal: &euro;70.00"));
        assert!(message.html.contains("https://gameshopenter.nl/winkelwagen"));
        assert_eq!(
            message.text.as_deref(),
            Some("Hoi Jan, je liet 1 item(s) achter in je winkelwagen 24 uur geleden.")
        );
    }
}
