//! User-facing text in every supported reply language.

use crate::language::Language;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    AskLanguages,
    UnsupportedLanguage { phrase: String },
    SameLanguages,
    UploadPrompt { max_size_mb: u64 },
    TranslationInProgress,
    TranslationAlreadyComplete,
    UnsupportedFile { name: String },
    FileTooLarge { name: String, max_size_mb: u64 },
    NoFileReceived,
    TranslationStarted { source: Language, target: Language },
    SlideProgress { index: usize, total: usize },
    Saving,
    Completed { file_name: String },
    Failed,
    UnknownTool { name: String },
    SessionReset,
}

impl Message {
    pub fn render(&self, language: Language) -> String {
        use Language::{English as En, Japanese as Ja, TraditionalChinese as Zh};

        match (self, language) {
            (Message::AskLanguages, En) => {
                "Which language is the PowerPoint in, and which language should it be translated into?".to_string()
            }
            (Message::AskLanguages, Zh) => "請問您要將 PowerPoint 從哪種語言翻譯成哪種語言？".to_string(),
            (Message::AskLanguages, Ja) => "PowerPoint をどの言語からどの言語に翻訳しますか？".to_string(),

            (Message::UnsupportedLanguage { phrase }, En) => format!(
                "I can only translate between Traditional Chinese, English and Japanese; \"{}\" is not one of them. Which languages should I use?",
                phrase
            ),
            (Message::UnsupportedLanguage { phrase }, Zh) => format!(
                "目前只支援繁體中文、英文與日文之間的翻譯，無法辨識「{}」。請問要使用哪兩種語言？",
                phrase
            ),
            (Message::UnsupportedLanguage { phrase }, Ja) => format!(
                "翻訳できるのは中国語（繁体字）・英語・日本語の間のみです。「{}」は対応していません。どの言語を使いますか？",
                phrase
            ),

            (Message::SameLanguages, En) => {
                "The source and target languages are the same. Which language should the slides be translated into?".to_string()
            }
            (Message::SameLanguages, Zh) => "來源語言與目標語言相同，請問要翻譯成哪種語言？".to_string(),
            (Message::SameLanguages, Ja) => "翻訳元と翻訳先の言語が同じです。どの言語に翻訳しますか？".to_string(),

            (Message::UploadPrompt { max_size_mb }, En) => format!(
                "Sure, please upload the PowerPoint file you want translated (.ppt or .pptx, up to {} MB).",
                max_size_mb
            ),
            (Message::UploadPrompt { max_size_mb }, Zh) => format!(
                "好的，請上傳您要翻譯的 PowerPoint 文件（.ppt 或 .pptx，最大 {} MB）",
                max_size_mb
            ),
            (Message::UploadPrompt { max_size_mb }, Ja) => format!(
                "承知しました。翻訳する PowerPoint ファイルをアップロードしてください（.ppt または .pptx、最大 {} MB）。",
                max_size_mb
            ),

            (Message::TranslationInProgress, En) => {
                "A translation is already waiting for your file. Please upload it to continue.".to_string()
            }
            (Message::TranslationInProgress, Zh) => "目前已有翻譯正在等待您上傳檔案，請上傳後繼續。".to_string(),
            (Message::TranslationInProgress, Ja) => {
                "すでに翻訳がファイルのアップロードを待っています。ファイルをアップロードしてください。".to_string()
            }

            (Message::TranslationAlreadyComplete, En) => {
                "This session's translation is finished. Start a new session to translate another file.".to_string()
            }
            (Message::TranslationAlreadyComplete, Zh) => "本次對話的翻譯已完成，如需翻譯其他檔案請開啟新的對話。".to_string(),
            (Message::TranslationAlreadyComplete, Ja) => {
                "このセッションの翻訳は完了しています。別のファイルを翻訳するには新しいセッションを開始してください。".to_string()
            }

            (Message::UnsupportedFile { name }, En) => format!("Please upload a .ppt or .pptx file ({} is not one).", name),
            (Message::UnsupportedFile { name }, Zh) => format!("請上傳 .ppt 或 .pptx 檔案（{} 不是簡報檔）。", name),
            (Message::UnsupportedFile { name }, Ja) => {
                format!(".ppt または .pptx ファイルをアップロードしてください（{} は対象外です）。", name)
            }

            (Message::FileTooLarge { name, max_size_mb }, En) => {
                format!("{} is larger than the {} MB limit.", name, max_size_mb)
            }
            (Message::FileTooLarge { name, max_size_mb }, Zh) => {
                format!("{} 超過 {} MB 的大小上限。", name, max_size_mb)
            }
            (Message::FileTooLarge { name, max_size_mb }, Ja) => {
                format!("{} はサイズ上限の {} MB を超えています。", name, max_size_mb)
            }

            (Message::NoFileReceived, En) => {
                "No file was received, so the translation was cancelled. Ask again whenever you are ready.".to_string()
            }
            (Message::NoFileReceived, Zh) => "未收到檔案，已取消翻譯。準備好後請再告訴我。".to_string(),
            (Message::NoFileReceived, Ja) => {
                "ファイルを受け取れなかったため翻訳を取り消しました。準備ができたら改めてお知らせください。".to_string()
            }

            (Message::TranslationStarted { source, target }, lang) => {
                let (from, to) = (source.name_in(lang), target.name_in(lang));
                match lang {
                    En => format!("Starting translation...\nFrom {} to {}", from, to),
                    Zh => format!("開始翻譯...\n從{}翻譯成{}", from, to),
                    Ja => format!("翻訳を開始します...\n{}から{}へ", from, to),
                }
            }

            (Message::SlideProgress { index, total }, En) => format!("Translating slide {}/{}...", index, total),
            (Message::SlideProgress { index, total }, Zh) => format!("正在翻譯第 {}/{} 張投影片...", index, total),
            (Message::SlideProgress { index, total }, Ja) => format!("スライド {}/{} を翻訳中...", index, total),

            (Message::Saving, En) => "Translation completed, generating file...".to_string(),
            (Message::Saving, Zh) => "翻譯完成，正在產生檔案...".to_string(),
            (Message::Saving, Ja) => "翻訳が完了しました。ファイルを生成しています...".to_string(),

            (Message::Completed { file_name }, En) => format!("Translation finished! Download your file: {}", file_name),
            (Message::Completed { file_name }, Zh) => format!("翻譯完成！請下載檔案：{}", file_name),
            (Message::Completed { file_name }, Ja) => format!("翻訳が完了しました！ファイルをダウンロードしてください：{}", file_name),

            (Message::Failed, En) => "Sorry, something went wrong while processing your request. Please try again.".to_string(),
            (Message::Failed, Zh) => "抱歉，處理您的請求時發生錯誤，請再試一次。".to_string(),
            (Message::Failed, Ja) => "申し訳ありません。処理中にエラーが発生しました。もう一度お試しください。".to_string(),

            (Message::UnknownTool { name }, En) => format!("I don't have a tool called \"{}\".", name),
            (Message::UnknownTool { name }, Zh) => format!("目前沒有名為「{}」的工具。", name),
            (Message::UnknownTool { name }, Ja) => format!("「{}」というツールはありません。", name),

            (Message::SessionReset, En) => "Started a new session.".to_string(),
            (Message::SessionReset, Zh) => "已開啟新的對話。".to_string(),
            (Message::SessionReset, Ja) => "新しいセッションを開始しました。".to_string(),
        }
    }
}
