mod app;
mod args;
mod build_info;
mod cmd_probe;
mod cmd_run;

use app::Executable;

fn main() {
    app::exec()
}
