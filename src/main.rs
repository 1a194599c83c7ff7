fn main() {
    heredicheck_lib::run()
}
