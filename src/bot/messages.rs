use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;

use crate::bot::format::{
    change_symbol, format_price, parse_percentage, percentage_symbol, persian_date_time,
    time_until_midnight_tehran, usage_level, UP,
};
use crate::data::parser::{CryptoItem, PriceItem, Usage};

const RULE: &str = "———————————————";
const SUPPORT_FOOTER: &str =
    "برای انتقادات، پیشنهادات و یا گزارش خرابی و باگ به این آیدی پیام دهید:\n@pouria_drd";

pub fn welcome(name: &str, total_users: usize) -> String {
    format!(
        "سلام \u{1f44b} <b>{}</b> عزیز!\n\
         به ربات <b>ArzWatch</b> خوش اومدی \u{1f525}\n\n\
         این ربات برای نمایش قیمت‌های لحظه‌ای بازار طراحی شده \u{1f9d1}\u{200d}\u{1f4bb}\n\n\
         <code><b>{}</b></code> نفر درحال استفاده از این ربات هستند. \u{1f465}\n\n\
         برای مشاهده دستورات موجود، کافیه از دستور زیر استفاده کنی:\n\
         \u{1f449} /help\n\n\
         {}",
        escape(name),
        total_users,
        SUPPORT_FOOTER
    )
}

pub fn help() -> String {
    format!(
        "\u{1f4da} <b>راهنمای دستورات ربات ArzWatch</b>\n\n\
         /gold - قیمت طلا\n\
         /coin - قیمت سکه\n\
         /crypto - قیمت ارز دیجیتال\n\
         /currency - قیمت ارزها\n\
         /usage - نمایش اطلاعات مصرفی\n\
         /help - نمایش همین راهنما\n\n\
         \u{1f4a1} همه‌ی اطلاعات از منابع معتبر و به‌روز جمع‌آوری میشه و ربات هر چند دقیقه یکبار آپدیت میشه!\n\n\
         {}",
        SUPPORT_FOOTER
    )
}

pub fn error() -> &'static str {
    "\u{274c} خطایی رخ داد! لطفا دوباره امتحان کنید."
}

fn header(title: &str, retrieved_at: &DateTime<Utc>) -> String {
    let (date, time) = persian_date_time(retrieved_at);
    format!(
        "<b>\u{1f4ca} {title}</b>\n\n\
         \u{1f5d3}\u{fe0f} <b>{date}</b> \u{23f0} <b>{time}</b>\n\
         {RULE}"
    )
}

fn item_section(item: &PriceItem, flag: &str) -> String {
    let symbol = change_symbol(item.change_amount.value);
    let title = match flag {
        "" => format!("<b>{}</b>", escape(&item.title)),
        _ => format!("<b>{}</b> {}", escape(&item.title), flag),
    };
    format!(
        "\n\u{1f539} {title}\n\
         \u{1f4b0} <b>قیمت:</b> <code>{}</code> تومان\n\
         {symbol} <b>مقدار تغییر:</b> <code>{}</code>\n\
         {symbol} <b>درصد تغییر:</b> <code>{}</code>\n\
         {RULE}",
        format_price(item.price),
        escape(&item.change_amount.raw),
        escape(&item.change_percentage),
    )
}

fn item_board(
    title: &str,
    items: &[PriceItem],
    retrieved_at: &DateTime<Utc>,
    flag: impl Fn(&PriceItem) -> &'static str,
) -> String {
    let body = items
        .iter()
        .map(|item| item_section(item, flag(item)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", header(title, retrieved_at), body)
}

pub fn gold(items: &[PriceItem], retrieved_at: &DateTime<Utc>) -> String {
    item_board("قیمت طلا", items, retrieved_at, |_| "")
}

pub fn coin(items: &[PriceItem], retrieved_at: &DateTime<Utc>) -> String {
    item_board("قیمت سکه", items, retrieved_at, |_| "")
}

pub fn currency_flag(title: &str) -> &'static str {
    match title {
        "دلار" => "\u{1f1fa}\u{1f1f8}",
        "یورو" => "\u{1f1ea}\u{1f1fa}",
        "درهم امارات" => "\u{1f1e6}\u{1f1ea}",
        "پوند انگلیس" => "\u{1f1ec}\u{1f1e7}",
        "لیر ترکیه" => "\u{1f1f9}\u{1f1f7}",
        "یوان چین" => "\u{1f1e8}\u{1f1f3}",
        "روبل روسیه" => "\u{1f1f7}\u{1f1fa}",
        _ => "\u{1f3f3}\u{fe0f}",
    }
}

pub fn currency(items: &[PriceItem], retrieved_at: &DateTime<Utc>) -> String {
    item_board("قیمت ارزها", items, retrieved_at, |item| currency_flag(&item.title))
}

pub fn crypto(items: &[CryptoItem], retrieved_at: &DateTime<Utc>) -> String {
    let body = items
        .iter()
        .map(|coin| {
            let symbol = parse_percentage(&coin.change_24h)
                .map(percentage_symbol)
                .unwrap_or(UP);
            format!(
                "\n\u{1f4b0} <b>{}</b> <code>({})</code>\n\
                 \u{1f4b5} قیمت دلار: <code>{}</code>\n\
                 \u{1f4b5} قیمت تومان: <code>{}</code>\n\
                 \u{1f4b0} مارکت کپ: <code>{}</code>\n\
                 {} تغییرات ۲۴ساعته: <code>{}</code>\n\
                 {RULE}",
                escape(&coin.name_fa),
                escape(&coin.symbol),
                escape(&coin.price_usd),
                format_price(coin.price_irr),
                escape(&coin.market_cap),
                symbol,
                escape(&coin.change_24h),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", header("قیمت ارز دیجیتال", retrieved_at), body)
}

pub fn usage(name: &str, usage: &Usage, now: DateTime<Utc>) -> String {
    let level = usage_level(usage.request_count, usage.max_request_count);
    let (joined_date, joined_time) = persian_date_time(&usage.created_at);
    let mut text = format!(
        "خیلی خوشحالیم که از ربات ما استفاده می‌کنی <b>{}</b> !\n\n\
         اطلاعات مصرفی شما:\n\n\
         {} <b>درصد مصرف:</b> <code>{}%</code>\n\
         \u{1f4ca} <b>تعداد درخواست امروز:</b> <code>{}</code> از <code>{}</code>\n\
         \u{23f3} <b>زمان باقی‌مانده تا ریست:</b> {}\n\
         \u{1f5d3}\u{fe0f}تاریخ عضویت: <b>{}</b> \u{23f0} <b>{}</b>",
        escape(name),
        level.emoji,
        level.percent,
        usage.request_count,
        usage.max_request_count,
        time_until_midnight_tehran(now),
        joined_date,
        joined_time,
    );
    if !level.warning.is_empty() {
        text.push_str("\n\n");
        text.push_str(level.warning);
    }
    text
}
