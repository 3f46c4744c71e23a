
fn main() {
    qabridge_lib::run()
}
