//! Main tank drive executable entry point.
//!
//! # Architecture
//!
//! The executable drives the simulated robot through a scripted routine:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the simulated devices
//!     - Start odometry and wait for the heading sensor to calibrate
//!     - Start the pose archiver
//!     - Run each motion of the routine in turn
//!     - Stop everything and save a summary of the run
//!
//! A parameter file path may be given as the only argument, otherwise
//! `tank_exec.toml` is loaded from the parameters directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, info, warn};
use serde::Serialize;
use std::env;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::thread;

// Internal
use tank_lib::{
    devices::{lock, HeadingSensor, MotorGroup, Shared},
    odometry::{Odometry, Pose, PoseReader},
    params::TankExecParams,
    sim::SimRobot,
    smart_drive::SmartDrive,
    tank_drive::TankDrive,
    tracker::HorizontalTracker,
    vec2::Vec2,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, parse_level, LevelFilter},
    session::{self, Session},
    time::millis_to_duration,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of the pose archive.
#[derive(Serialize)]
struct PoseRecord {
    time_s: f64,
    x_in: f64,
    y_in: f64,
    center_x_in: f64,
    center_y_in: f64,
    heading_deg: f64,
    true_x_in: f64,
    true_y_in: f64,
    true_heading_deg: f64,
}

/// Summary of the run, saved at exit.
#[derive(Serialize)]
struct RunSummary {
    num_motions: usize,
    duration_s: f64,
    final_pose: Pose,
    true_position_in: [f64; 2],
    true_heading_deg: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "tank_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = match host::get_log_level() {
        Some(l) => parse_level(&l).wrap_err("Invalid log level in the environment")?,
        None => LevelFilter::Debug
    };
    logger_init(log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Tank Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let params: TankExecParams = match args.len() {
        1 => util::params::load("tank_exec.toml"),
        2 => {
            info!("Loading parameters from \"{}\"", &args[1]);
            util::params::load_file(&args[1])
        },
        n => return Err(eyre!(
            "Expected either zero or one argument, found {}", n - 1
        ))
    }.wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE DEVICES ----

    let robot = SimRobot::new(params.sim);

    let left: Shared<dyn MotorGroup> = robot.left_motors();
    let right: Shared<dyn MotorGroup> = robot.right_motors();
    let imu: Shared<dyn HeadingSensor> = robot.imu();

    let tracker = params.drive.tracker
        .map(|p| HorizontalTracker::new(robot.tracker_encoder(), p));

    info!(
        "Simulated robot initialised ({} tracking wheel)",
        if tracker.is_some() { "with" } else { "no" }
    );

    lock(&imu).calibrate();

    // ---- INITIALISE MODULES ----

    let odom = Odometry::new(
        left.clone(),
        right.clone(),
        imu.clone(),
        tracker,
        &params.drive
    ).wrap_err("Failed to initialise Odometry")?;

    // Start with the robot's centre, rather than the tracking wheel, at the
    // origin
    if let Some(t) = params.drive.tracker {
        odom.set_position(Vec2::from_xy(0.0, -t.offset_in));
    }

    let drive = TankDrive::new(left, right)
        .with_speed_mode(params.speed_mode);
    let mut smart_drive = SmartDrive::new(drive, imu, params.drive.clone())
        .wrap_err("Failed to initialise SmartDrive")?;

    let odom_handle = odom.start()
        .wrap_err("Failed to start Odometry")?;

    info!("Waiting for the heading sensor to calibrate");
    while !odom_handle.is_tracking() {
        thread::sleep(params.drive.cycle_period());
    }
    info!("Odometry tracking\n");

    // ---- START ARCHIVER ----

    let archiver = Archiver::from_path(&session, "pose_trace.csv")
        .wrap_err("Failed to create the pose archive")?;
    let arch_run = Arc::new(AtomicBool::new(true));
    let arch_thread = {
        let run = arch_run.clone();
        let reader = odom_handle.reader();
        let robot = robot.clone();
        let period_ms = params.archive_period_ms;

        thread::Builder::new()
            .name("pose_archive".into())
            .spawn(move || archive_poses(archiver, reader, robot, run, period_ms))
            .wrap_err("Failed to start the pose archiver")?
    };

    // ---- RUN ROUTINE ----

    let start_s = session::get_elapsed_seconds();

    for (i, motion) in params.routine.iter().enumerate() {
        info!("Motion {}/{}: {:?}", i + 1, params.routine.len(), motion);
        smart_drive.execute(*motion);

        let pose = odom_handle.pose();
        info!(
            "    pose ({:.2}, {:.2}) in, heading {:.1} deg",
            pose.position.x(), pose.position.y(), pose.heading_deg
        );
    }

    smart_drive.stop();

    let duration_s = session::get_elapsed_seconds() - start_s;
    info!("Routine complete in {:.2} s\n", duration_s);

    // ---- SHUTDOWN ----

    arch_run.store(false, Ordering::Relaxed);
    if arch_thread.join().is_err() {
        warn!("Pose archiver panicked");
    }

    let odom = odom_handle.stop()
        .wrap_err("Failed to stop Odometry")?;

    let final_pose = odom.pose();
    let true_position = robot.true_position();

    info!(
        "Final estimate ({:.2}, {:.2}) in, heading {:.1} deg",
        final_pose.center_position.x(),
        final_pose.center_position.y(),
        final_pose.heading_deg
    );
    info!(
        "True position ({:.2}, {:.2}) in, heading {:.1} deg",
        true_position.x(),
        true_position.y(),
        util::maths::wrap_heading_deg(robot.true_heading_deg())
    );

    session.save("summary.json", RunSummary {
        num_motions: params.routine.len(),
        duration_s,
        final_pose,
        true_position_in: [true_position.x(), true_position.y()],
        true_heading_deg: robot.true_heading_deg(),
    });

    session.exit();

    Ok(())
}

/// Pose archiver thread, records the estimated and true pose every period.
fn archive_poses(
    mut archiver: Archiver,
    reader: PoseReader,
    robot: SimRobot,
    run: Arc<AtomicBool>,
    period_ms: f64
) {
    let period = millis_to_duration(period_ms);

    while run.load(Ordering::Relaxed) {
        let pose = reader.pose();
        let true_position = robot.true_position();

        let record = PoseRecord {
            time_s: session::get_elapsed_seconds(),
            x_in: pose.position.x(),
            y_in: pose.position.y(),
            center_x_in: pose.center_position.x(),
            center_y_in: pose.center_position.y(),
            heading_deg: pose.heading_deg,
            true_x_in: true_position.x(),
            true_y_in: true_position.y(),
            true_heading_deg: robot.true_heading_deg(),
        };

        if let Err(e) = archiver.serialise(record) {
            warn!("Could not archive pose: {}", e);
        }

        thread::sleep(period);
    }
}
