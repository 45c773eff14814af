//! Drive the tracking core against the simulated link and print joint poses.
//!
//! Run with: cargo run --example simulate

use std::thread::sleep;
use std::time::Duration;

use bodytrack::sim::{MemoryStore, SimulatedLink};
use bodytrack::{HmdFrame, Pose, Tracking, TrackerRole};
use nalgebra::{UnitQuaternion, Vector3};

fn main() {
    env_logger::init();

    let tracking = Tracking::new(SimulatedLink::new(), MemoryStore::new()).unwrap();
    tracking.on_load().unwrap();
    tracking.initialize();

    // Two simulated phones strapped to the body.
    tracking.set_role(0, TrackerRole::Waist).unwrap();
    tracking.set_role(1, TrackerRole::Chest).unwrap();
    tracking.link().set_tracker_count(2);
    sleep(Duration::from_millis(100));

    println!("{}", tracking.status_text());

    let hmd = HmdFrame {
        pose: Pose {
            position: Vector3::new(0.0, 1.7, 0.0),
            orientation: UnitQuaternion::identity(),
        },
        yaw: 0.0,
    };

    for frame in 0..10 {
        // Wobble the waist tracker a little each frame.
        let raw = UnitQuaternion::from_euler_angles(0.0, frame as f32 * 0.1, 0.05);
        tracking.link().set_raw_orientation(0, raw);

        tracking.update(&hmd);
        for joint in tracking.joints() {
            let p = joint.pose.position;
            println!("frame {frame:>2} {:<20} ({:+.3}, {:+.3}, {:+.3})", joint.name, p.x, p.y, p.z);
        }
        sleep(Duration::from_millis(25));
    }

    tracking.signal(0);
    println!("buzzed: {:?}", tracking.link().signalled());
    tracking.shutdown();
}
