mod cli;

use std::{error::Error, path::PathBuf};

use actas::{
    api::{ActaClient, PasswordAuthenticator},
    attachment::{self, AttachmentClient},
    config::{self, Config},
    model::Category,
    resolver::{AssignmentRef, EntityRef, Resolution, Resolver},
    session::{self, Session, Status},
    slot::{PdfFile, SlotId, SlotState},
    status::{self, StatusFilter},
};
use anyhow::anyhow;
use clap::Parser;
use log::{debug, info, warn};

#[derive(Parser)]
#[command(name = env!("CARGO_BIN_NAME"))]
#[command(bin_name = env!("CARGO_BIN_NAME"))]
enum Cli {
    #[command(about = "Prints tool version")]
    #[command(long_about = None)]
    Version,

    #[command(about = "Signs in and stores the access token")]
    #[command(long_about = None)]
    Login(ConfigArgs),

    #[command(about = "Forgets the stored access token")]
    #[command(long_about = None)]
    Logout(ConfigArgs),

    #[command(about = "Manages signed actas of assignments, terminations and sales")]
    #[command(long_about = None)]
    #[command(subcommand)]
    Acta(ActaCommand),

    #[command(about = "Shows signed and pending actas")]
    #[command(long_about = None)]
    Status(StatusArgs),

    #[command(about = "Registers a sale of equipment")]
    #[command(long_about = None)]
    Sale(ConfigArgs),
}

#[derive(clap::Subcommand)]
enum ActaCommand {
    #[command(about = "Shows which acta slots a record has")]
    Info(RefArgs),

    #[command(about = "Downloads the system generated acta for printing")]
    Generated(RefArgs),

    #[command(about = "Uploads a signed acta")]
    Upload(UploadArgs),

    #[command(about = "Downloads a signed acta")]
    Download(SlotArgs),

    #[command(about = "Deletes a signed acta")]
    Delete(SlotArgs),
}

#[derive(clap::Args)]
struct ConfigArgs {
    #[arg(short='c', long, default_value=Some("./config.toml"))]
    config_path: PathBuf,
}

#[derive(clap::Args)]
#[group(
    id = "reference",
    required = true,
    multiple = true,
    args = ["assignment", "assignment_id", "employee", "termination", "sale", "json"]
)]
struct RefArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Id of the assignment.
    #[arg(long)]
    assignment: Option<i64>,

    /// Assignment id when the record carries it separately.
    #[arg(long)]
    assignment_id: Option<i64>,

    /// Id of the employee.
    #[arg(long)]
    employee: Option<i64>,

    #[arg(long, conflicts_with_all = ["assignment", "assignment_id", "sale"])]
    termination: Option<i64>,

    #[arg(long, conflicts_with_all = ["assignment", "assignment_id", "employee"])]
    sale: Option<i64>,

    /// Reference as JSON, e.g. {"kind": "sale", "id": 4}.
    #[arg(
        long,
        conflicts_with_all = ["assignment", "assignment_id", "employee", "termination", "sale"]
    )]
    json: Option<String>,
}

#[derive(clap::Args)]
struct SlotArgs {
    #[command(flatten)]
    reference: RefArgs,

    /// Category of the slot. Can be omitted when only one slot is offered.
    #[arg(short = 'k', long, value_enum)]
    category: Option<Category>,
}

#[derive(clap::Args)]
struct UploadArgs {
    #[command(flatten)]
    slot: SlotArgs,

    #[arg()]
    file: PathBuf,
}

#[derive(clap::Args)]
struct StatusArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(short, long, value_enum, default_value_t = StatusFilter::All)]
    filter: StatusFilter,

    #[arg(short, long)]
    search: Option<String>,
}

impl RefArgs {
    fn to_ref(&self) -> anyhow::Result<EntityRef> {
        if let Some(json) = &self.json {
            return Ok(serde_json::from_str(json)?);
        }

        if let Some(id) = self.termination {
            return Ok(EntityRef::Termination {
                id,
                employee_id: self.employee,
            });
        }

        if let Some(id) = self.sale {
            return Ok(EntityRef::Sale { id });
        }

        if self.assignment.is_some() || self.assignment_id.is_some() {
            return Ok(EntityRef::Assignment(AssignmentRef {
                id: self.assignment,
                assignment_id: self.assignment_id,
                employee_id: self.employee,
                employee: None,
            }));
        }

        match self.employee {
            Some(id) => Ok(EntityRef::Employee(actas::resolver::EmployeeRef {
                id,
                full_name: None,
            })),
            None => Err(anyhow!("record reference is required")),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cli::parse() {
        Cli::Version => {
            println!(env!("CARGO_PKG_VERSION"));
        }
        Cli::Login(args) => {
            let cfg = load_config(&args)?;
            let mut session = load_session(&cfg)?;

            let (username, password) = cli::ask_credentials(session.username.as_deref())?;

            let auth = PasswordAuthenticator::new(&cfg.base_url, cfg.timeout())?;
            let token = auth.login(username.clone(), password)?;

            session.sign_in(username, token);

            debug!("Сохраняем сессию в {:?}", cfg.session_path);
            session::save(&session, &cfg.session_path)?;

            println!("Вход выполнен");
        }
        Cli::Logout(args) => {
            let cfg = load_config(&args)?;
            let mut session = load_session(&cfg)?;

            if !session.sign_out() {
                println!("Вход не выполнен");
                return Ok(());
            }
            session::save(&session, &cfg.session_path)?;

            println!("Сессия завершена");
        }
        Cli::Acta(cmd) => run_acta(cmd)?,
        Cli::Status(args) => {
            let cfg = load_config(&args.config)?;
            let api = get_client(&cfg)?;

            let status = status::fetch(&api, args.filter, args.search.as_deref())
                .map_err(|e| anyhow!(e.user_message("failed to load actas status")))?;

            cli::print_status(&status);
        }
        Cli::Sale(args) => {
            let cfg = load_config(&args)?;
            let api = get_client(&cfg)?;

            match cli::compose_sale(&api, cfg.default_prices)? {
                Some((composer, receipt)) => {
                    println!(
                        "Продажа #{} зарегистрирована: {}, устройств {}, сумма {}",
                        receipt.sale_id,
                        receipt.summary.buyer_name,
                        receipt.summary.device_count,
                        receipt.summary.total_price
                    );

                    cli::offer_sale_acta(&api, &composer)?;
                }
                None => println!("Продажа отменена"),
            }
        }
    };

    Ok(())
}

fn run_acta(cmd: ActaCommand) -> anyhow::Result<()> {
    match cmd {
        ActaCommand::Info(args) => {
            let reference = args.to_ref()?;
            let cfg = load_config(&args.config)?;
            let api = get_client(&cfg)?;

            let resolution = resolve(&api, &reference)?;

            cli::print_resolution(&resolution);
        }
        ActaCommand::Generated(args) => {
            let reference = args.to_ref()?;
            let cfg = load_config(&args.config)?;
            let api = get_client(&cfg)?;

            let resolution = resolve(&api, &reference)?;
            let target = resolution
                .generic_target()
                .map_err(|e| anyhow!(e.user_message("failed to determine the record")))?;

            let path = attachment::download_generated(&api, &target, &cfg.download_dir)
                .map_err(|e| anyhow!(e.user_message("failed to download acta")))?;

            println!("Акт сохранён в {}", path.display());
        }
        ActaCommand::Upload(args) => {
            let reference = args.slot.reference.to_ref()?;

            // Файл проверяется до любых запросов к бэкенду.
            let file = PdfFile::open(&args.file)
                .map_err(|e| anyhow!(e.user_message("failed to read file")))?;

            let cfg = load_config(&args.slot.reference.config)?;
            let api = get_client(&cfg)?;
            let resolver = Resolver::new(&api);

            let (slot, state) = pick_slot(&resolver, &reference, args.slot.category)?;

            let mut client = AttachmentClient::new(&api, slot, state)
                .with_refresh(|| resolver.refresh_slot(&reference, slot));

            client
                .upload_file(file)
                .map_err(|e| anyhow!(e.user_message("failed to upload acta")))?;

            info!("Состояние {}: {:?}", slot, client.state());
            println!("Акт загружен в {}", slot);
        }
        ActaCommand::Download(args) => {
            let reference = args.reference.to_ref()?;
            let cfg = load_config(&args.reference.config)?;
            let api = get_client(&cfg)?;
            let resolver = Resolver::new(&api);

            let (slot, state) = pick_slot(&resolver, &reference, args.category)?;

            let path = AttachmentClient::new(&api, slot, state)
                .download(&cfg.download_dir)
                .map_err(|e| anyhow!(e.user_message("failed to download acta")))?;

            println!("Акт сохранён в {}", path.display());
        }
        ActaCommand::Delete(args) => {
            let reference = args.reference.to_ref()?;
            let cfg = load_config(&args.reference.config)?;
            let api = get_client(&cfg)?;
            let resolver = Resolver::new(&api);

            let (slot, state) = pick_slot(&resolver, &reference, args.category)?;

            let mut client = AttachmentClient::new(&api, slot, state)
                .with_refresh(|| resolver.refresh_slot(&reference, slot));

            let outcome = client
                .delete(&mut cli::InquireGate)
                .map_err(|e| anyhow!(e.user_message("failed to delete acta")))?;

            cli::print_delete_outcome(outcome);
        }
    }

    Ok(())
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    debug!("Подгружаем конфиг из {:?}", args.config_path);
    config::load(args.config_path.clone())
}

fn load_session(cfg: &Config) -> anyhow::Result<Session> {
    debug!("Подгружаем сессию из {:?}", cfg.session_path);
    Ok(session::load(&cfg.session_path)?)
}

fn get_client(cfg: &Config) -> anyhow::Result<ActaClient> {
    let session = load_session(cfg)?;

    let token = session.valid_token();
    match session.status() {
        Status::Active => {}
        Status::Expired => warn!("Сессия истекла, выполните вход заново"),
        Status::SignedOut => debug!("Токена нет, запросы пойдут без авторизации"),
    }

    Ok(ActaClient::new(&cfg.base_url, cfg.timeout(), token)?)
}

fn resolve(api: &ActaClient, reference: &EntityRef) -> anyhow::Result<Resolution> {
    Resolver::new(api)
        .resolve(reference)
        .map_err(|e| anyhow!(e.user_message("failed to load acta info")))
}

/// Выбирает слот по категории.
/// Если категория не указана, подходит только единственный предложенный слот.
fn pick_slot(
    resolver: &Resolver,
    reference: &EntityRef,
    category: Option<Category>,
) -> anyhow::Result<(SlotId, SlotState)> {
    let resolution = resolver
        .resolve(reference)
        .map_err(|e| anyhow!(e.user_message("failed to load acta info")))?;

    if let Some(category) = category {
        return Ok(resolution.offered_slot(category)?);
    }

    let mut slots = resolution.offered_slots();
    match slots.len() {
        0 => Err(anyhow!("{} has no acta slots", resolution.reference())),
        1 => {
            let (slot, state) = slots.remove(0);
            Ok((slot, state.clone()))
        }
        _ => Err(anyhow!(
            "{} has several acta slots, choose one with --category",
            resolution.reference()
        )),
    }
}
