use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Column, Image};
use iced::{Alignment, ContentFit, Element, Length, Task, Theme};
use rfd::{FileDialog, MessageDialog, MessageLevel};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::EnvFilter;

use photo_colorizer::config::AppConfig;
use photo_colorizer::pipeline::{load_model, Colorizer};

/// Side length of the image panel
const PANEL_SIZE: f32 = 400.0;

/// Image extensions offered by the open dialog
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Main application state
struct ColorizerApp {
    /// The inference session, shared with the background colorize task
    colorizer: Arc<Mutex<Colorizer>>,
    /// Image picked by the user
    selected: Option<PathBuf>,
    /// Latest colorized file, written next to the input
    colorized: Option<PathBuf>,
    /// What the panel is showing right now
    preview: Option<Handle>,
    /// A colorization is in flight
    busy: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked "Select Image"
    SelectImage,
    /// User clicked "Colorize Image"
    Colorize,
    /// Background colorization finished
    ColorizeComplete(Result<PathBuf, String>),
    /// User clicked "Save Colorized Image"
    SaveImage,
}

impl ColorizerApp {
    fn new(colorizer: Colorizer) -> (Self, Task<Message>) {
        let status = format!("Ready. Model: {}", colorizer.model_name());

        (
            ColorizerApp {
                colorizer: Arc::new(Mutex::new(colorizer)),
                selected: None,
                colorized: None,
                preview: None,
                busy: false,
                status,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SelectImage => {
                let picked = FileDialog::new()
                    .set_title("Select Image")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_file();

                if let Some(path) = picked {
                    tracing::info!("Selected {}", path.display());
                    self.status = format!("Selected {}", display_name(&path));
                    self.preview = Some(Handle::from_path(&path));
                    self.selected = Some(path);
                    self.colorized = None;
                }

                Task::none()
            }
            Message::Colorize => {
                let Some(input) = self.selected.clone() else {
                    show_error("Please select an image first.");
                    return Task::none();
                };

                let output = colorized_path(&input);
                self.busy = true;
                self.status = format!("Colorizing {}...", display_name(&input));

                Task::perform(
                    colorize_async(self.colorizer.clone(), input, output),
                    Message::ColorizeComplete,
                )
            }
            Message::ColorizeComplete(result) => {
                self.busy = false;

                match result {
                    Ok(path) => {
                        self.status = format!("✅ Saved {}", path.display());
                        self.preview = Some(Handle::from_path(&path));
                        self.colorized = Some(path);
                    }
                    Err(e) => {
                        self.status = "Colorization failed.".to_string();
                        show_error(&e);
                    }
                }

                Task::none()
            }
            Message::SaveImage => {
                let Some(colorized) = self.colorized.clone() else {
                    show_error("No colorized image to save.");
                    return Task::none();
                };

                let default_name = colorized
                    .file_stem()
                    .map(|stem| format!("{}.jpg", stem.to_string_lossy()))
                    .unwrap_or_else(|| "colorized.jpg".to_string());

                let target = FileDialog::new()
                    .set_title("Save Colorized Image")
                    .add_filter("JPEG", &["jpg"])
                    .add_filter("PNG", &["png"])
                    .set_file_name(&default_name)
                    .save_file();

                if let Some(target) = target {
                    let target = with_default_extension(target);
                    match save_copy(&colorized, &target) {
                        Ok(()) => self.status = format!("✅ Saved {}", target.display()),
                        Err(e) => show_error(&e.to_string()),
                    }
                }

                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let panel: Element<Message> = match &self.preview {
            Some(handle) => Image::new(handle.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fixed(PANEL_SIZE))
                .height(Length::Fixed(PANEL_SIZE))
                .into(),
            None => container(text("No image selected"))
                .width(Length::Fixed(PANEL_SIZE))
                .height(Length::Fixed(PANEL_SIZE))
                .center_x(Length::Fixed(PANEL_SIZE))
                .center_y(Length::Fixed(PANEL_SIZE))
                .into(),
        };

        let idle = !self.busy;
        let buttons = row![
            button("Select Image")
                .on_press_maybe(idle.then_some(Message::SelectImage))
                .padding(10),
            button("Colorize Image")
                .on_press_maybe((idle && self.selected.is_some()).then_some(Message::Colorize))
                .padding(10),
            button("Save Colorized Image")
                .on_press_maybe((idle && self.colorized.is_some()).then_some(Message::SaveImage))
                .padding(10),
        ]
        .spacing(10);

        let content: Column<Message> = column![
            text("Image Colorization").size(32),
            panel,
            buttons,
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(40)
        .align_x(Alignment::Center);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load(None)?;
    let model = match load_model(&config.model_path) {
        Ok(model) => model,
        Err(e) => {
            show_error(&e.to_string());
            return Err(e.into());
        }
    };
    let colorizer = Colorizer::new(model);
    tracing::info!("🎨 Loaded model {}", colorizer.model_name());

    iced::application("Image Colorization", ColorizerApp::update, ColorizerApp::view)
        .theme(ColorizerApp::theme)
        .centered()
        .run_with(move || ColorizerApp::new(colorizer))
        .map_err(|e| anyhow::anyhow!("window error: {}", e))?;

    Ok(())
}

/// Run the pipeline off the UI thread.
/// The session is locked for the whole run; the buttons are disabled meanwhile.
async fn colorize_async(
    colorizer: Arc<Mutex<Colorizer>>,
    input: PathBuf,
    output: PathBuf,
) -> Result<PathBuf, String> {
    tokio::task::spawn_blocking(move || {
        let mut colorizer = colorizer.lock().unwrap_or_else(PoisonError::into_inner);
        colorizer.colorize(&input, &output)
    })
    .await
    .map_err(|e| format!("Colorization task failed: {}", e))?
    .map_err(|e| e.to_string())
}

/// `colorized_<name>` in the input's directory
fn colorized_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    input.with_file_name(format!("colorized_{}", name))
}

/// Save dialogs may return a bare name; fall back to JPEG
fn with_default_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("jpg")
    }
}

/// Re-encode the colorized file in the format implied by `target`.
fn save_copy(colorized: &Path, target: &Path) -> image::ImageResult<()> {
    let img = image::open(colorized)?;
    img.to_rgb8().save(target)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn show_error(message: &str) {
    tracing::error!("{}", message);
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("Error")
        .set_description(message)
        .show();
}
