fn main() {
    if let Err(err) = attendance_kiosk_lib::run() {
        eprintln!("attendance-kiosk: {err:#}");
        std::process::exit(1);
    }
}
