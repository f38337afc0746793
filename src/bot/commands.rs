//! Control commands recognized in every conversation state

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "الأوامر المتاحة / Available commands:"
)]
pub enum Command {
    #[command(description = "البدء من جديد / start over")]
    Start,
    #[command(description = "عرض المساعدة / show help")]
    Help,
    #[command(description = "إلغاء الإدخال الحالي / cancel the current entry")]
    Cancel,
    #[command(description = "تخطي الملاحظات / skip the notes")]
    Skip,
    #[command(description = "آخر المشتريات / latest purchases")]
    Recent(String),
}
