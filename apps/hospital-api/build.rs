fn main() {
    built::write_built_file().expect("Falha ao gerar metadados de compilação");
}
